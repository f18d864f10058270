//! Reconciliation planning and payment status rules.
//!
//! Everything here is pure: the database layer locks the rows, calls
//! [`plan_invoice`] inside its transaction and persists the plan.

use crate::models::{AllocationInput, Consignment, InvoiceTotals, NewInvoiceLine, Party};
use crate::services::error::BillingError;
use crate::services::pricing::{ensure_two_places, round2, RateBreakdown};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use uuid::Uuid;

/// Uniform pricing applied to every row of a batch instead of its stored
/// breakup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateOverrides {
    pub base_rate: Decimal,
    #[serde(default)]
    pub fuel_pct: Option<Decimal>,
    #[serde(default)]
    pub packing: Option<Decimal>,
    #[serde(default)]
    pub handling: Option<Decimal>,
    #[serde(default)]
    pub gst_pct: Option<Decimal>,
}

impl RateOverrides {
    fn breakdown(&self) -> RateBreakdown {
        RateBreakdown::compute(
            self.base_rate,
            self.fuel_pct.unwrap_or_default(),
            self.packing.unwrap_or_default(),
            self.handling.unwrap_or_default(),
            self.gst_pct.unwrap_or_default(),
        )
    }
}

/// Invoice contents computed from a locked batch, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationPlan {
    pub party_name: String,
    pub normalized_party: String,
    pub lines: Vec<NewInvoiceLine>,
    pub totals: InvoiceTotals,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
}

/// Validate a batch and price its lines.
///
/// The whole batch is rejected on the first broken invariant: a batch with
/// several parties never yields a partial invoice, and a row that already
/// carries an invoice is never skipped.
pub fn plan_invoice(
    rows: &[Consignment],
    party_filter: Option<&str>,
    overrides: Option<&RateOverrides>,
    additional_charges: Decimal,
) -> Result<ReconciliationPlan, BillingError> {
    if rows.is_empty() {
        return Err(BillingError::Validation(
            "At least one consignment is required".to_string(),
        ));
    }
    if additional_charges < Decimal::ZERO {
        return Err(BillingError::Validation(
            "additional_charges must not be negative".to_string(),
        ));
    }
    ensure_two_places("additional_charges", additional_charges)?;
    if let Some(o) = overrides {
        let negative = [Some(o.base_rate), o.fuel_pct, o.packing, o.handling, o.gst_pct]
            .into_iter()
            .flatten()
            .any(|v| v < Decimal::ZERO);
        if negative {
            return Err(BillingError::Validation(
                "Rate overrides must not be negative".to_string(),
            ));
        }
        ensure_two_places("overrides.base_rate", o.base_rate)?;
        for (name, value) in [
            ("overrides.fuel_pct", o.fuel_pct),
            ("overrides.packing", o.packing),
            ("overrides.handling", o.handling),
            ("overrides.gst_pct", o.gst_pct),
        ] {
            if let Some(value) = value {
                ensure_two_places(name, value)?;
            }
        }
    }

    let (party_name, normalized_party) = single_party(rows, party_filter)?;

    let invoiced: Vec<String> = rows
        .iter()
        .filter(|r| r.invoice_id.is_some())
        .map(|r| r.consignment_number.clone())
        .collect();
    if !invoiced.is_empty() {
        return Err(BillingError::already_invoiced(invoiced));
    }

    let lines: Vec<NewInvoiceLine> = rows
        .iter()
        .map(|row| match overrides {
            Some(o) => Ok(line_from_breakdown(row, &o.breakdown())),
            None => line_from_stored(row),
        })
        .collect::<Result<_, BillingError>>()?;

    let subtotal: Decimal = lines.iter().map(|l| l.subtotal).sum();
    let tax_amount: Decimal = lines.iter().map(|l| l.gst_amount).sum();
    let additional_charges = round2(additional_charges);

    Ok(ReconciliationPlan {
        party_name,
        normalized_party,
        totals: InvoiceTotals {
            subtotal,
            tax_amount,
            additional_charges,
            total_amount: subtotal + tax_amount + additional_charges,
        },
        period_start: rows.iter().map(|r| r.shipment_date).min(),
        period_end: rows.iter().map(|r| r.shipment_date).max(),
        lines,
    })
}

/// Display and normalized name of the one party the batch belongs to.
fn single_party(
    rows: &[Consignment],
    party_filter: Option<&str>,
) -> Result<(String, String), BillingError> {
    let filter = party_filter
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(|f| (f.to_string(), Party::normalize_name(f)));

    let mut parties: BTreeSet<String> = rows.iter().filter_map(|r| r.normalized_party()).collect();
    if let Some((_, normalized)) = &filter {
        parties.insert(normalized.clone());
    }
    if parties.len() > 1 {
        return Err(BillingError::MixedPartyBatch {
            parties: parties.into_iter().collect(),
        });
    }

    let from_rows = rows.iter().find_map(|r| {
        r.party_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(|n| (n.to_string(), Party::normalize_name(n)))
    });

    from_rows.or(filter).ok_or_else(|| {
        BillingError::Validation(
            "No party name on the consignments; supply a party filter".to_string(),
        )
    })
}

fn describe(row: &Consignment) -> String {
    format!(
        "Consignment {} ({}, {} g)",
        row.consignment_number, row.shipment_date, row.weight_grams
    )
}

fn line_from_breakdown(row: &Consignment, b: &RateBreakdown) -> NewInvoiceLine {
    NewInvoiceLine {
        consignment_id: row.consignment_id,
        description: describe(row),
        base_amount: b.base,
        fuel_amount: b.fuel,
        packing: b.packing,
        handling: b.handling,
        subtotal: b.subtotal,
        gst_amount: b.gst,
        total: b.total,
    }
}

/// Line from the breakup stored on the row. The stored pre-tax amount is
/// authoritative for the subtotal; GST is recomputed from a stored
/// percentage when one exists. Without a stored base, the base is whatever
/// the surcharges leave of the subtotal.
fn line_from_stored(row: &Consignment) -> Result<NewInvoiceLine, BillingError> {
    let subtotal = round2(row.stored_amount());
    let meta = row
        .stored_pricing()
        .map_err(|e| {
            BillingError::Validation(format!(
                "Consignment {} has unreadable pricing_meta: {}",
                row.consignment_number, e
            ))
        })?
        .unwrap_or_default();

    let gst = match (meta.gst_pct, meta.gst) {
        (Some(pct), _) => round2(subtotal * pct / Decimal::ONE_HUNDRED),
        (None, Some(amount)) => round2(amount),
        (None, None) => Decimal::ZERO,
    };

    let fuel = round2(meta.fuel.unwrap_or_default());
    let packing = round2(meta.packing.unwrap_or_default());
    let handling = round2(meta.handling.unwrap_or_default());
    let base = match meta.base {
        Some(base) => round2(base),
        None => subtotal - fuel - packing - handling,
    };

    Ok(NewInvoiceLine {
        consignment_id: row.consignment_id,
        description: describe(row),
        base_amount: base,
        fuel_amount: fuel,
        packing,
        handling,
        subtotal,
        gst_amount: gst,
        total: subtotal + gst,
    })
}

/// Check a payment's allocation split before anything is written.
pub fn validate_allocations(
    amount: Decimal,
    allocations: &[AllocationInput],
) -> Result<(), BillingError> {
    if amount <= Decimal::ZERO {
        return Err(BillingError::Validation(
            "Payment amount must be positive".to_string(),
        ));
    }
    ensure_two_places("amount", amount)?;

    let mut seen = HashSet::new();
    for allocation in allocations {
        if allocation.amount <= Decimal::ZERO {
            return Err(BillingError::Validation(format!(
                "Allocation to invoice {} must be positive",
                allocation.invoice_id
            )));
        }
        ensure_two_places("allocation amount", allocation.amount)?;
        if !seen.insert(allocation.invoice_id) {
            return Err(BillingError::Validation(format!(
                "Invoice {} is allocated more than once",
                allocation.invoice_id
            )));
        }
    }

    let allocated: Decimal = allocations.iter().map(|a| a.amount).sum();
    if allocated > amount {
        return Err(BillingError::Validation(format!(
            "Allocations ({}) exceed the payment amount ({})",
            allocated, amount
        )));
    }

    Ok(())
}

/// Read-time payment status for a party or period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillingStatus {
    Pending,
    Paid,
    #[serde(rename = "Partially Paid")]
    PartiallyPaid,
    Billed,
}

impl BillingStatus {
    pub fn label(&self) -> &'static str {
        match self {
            BillingStatus::Pending => "Pending",
            BillingStatus::Paid => "Paid",
            BillingStatus::PartiallyPaid => "Partially Paid",
            BillingStatus::Billed => "Billed",
        }
    }
}

/// Derive the status label. Unbilled work outranks everything else.
pub fn derive_status(unbilled: Decimal, billed: Decimal, paid: Decimal) -> BillingStatus {
    if unbilled > Decimal::ZERO {
        BillingStatus::Pending
    } else if paid > Decimal::ZERO && paid >= billed {
        BillingStatus::Paid
    } else if paid > Decimal::ZERO {
        BillingStatus::PartiallyPaid
    } else {
        BillingStatus::Billed
    }
}

/// Caller's reconciliation request, carried into the database transaction.
#[derive(Debug, Clone)]
pub struct ReconcileRequest {
    pub consignment_ids: Vec<Uuid>,
    pub party_filter: Option<String>,
    pub overrides: Option<RateOverrides>,
    pub additional_charges: Decimal,
    pub invoice_prefix: String,
    pub actor: String,
}

/// `{prefix}-{YYYYMM}-{seq:05}`.
pub fn format_invoice_number(prefix: &str, issued_on: NaiveDate, sequence: i64) -> String {
    format!("{}-{}-{:05}", prefix, issued_on.format("%Y%m"), sequence)
}

/// Billed and paid position of one party.
#[derive(Debug, Clone, Serialize)]
pub struct BillingSummary {
    pub party_id: Uuid,
    pub unbilled_amount: Decimal,
    pub billed_amount: Decimal,
    pub paid_amount: Decimal,
    pub outstanding_amount: Decimal,
    pub status: BillingStatus,
    pub status_label: &'static str,
}

impl BillingSummary {
    pub fn new(party_id: Uuid, unbilled: Decimal, billed: Decimal, paid: Decimal) -> Self {
        let status = derive_status(unbilled, billed, paid);
        Self {
            party_id,
            unbilled_amount: unbilled,
            billed_amount: billed,
            paid_amount: paid,
            outstanding_amount: billed - paid,
            status,
            status_label: status.label(),
        }
    }
}
