//! Request and response bodies for the HTTP API.

use crate::models::{
    AllocationInput, CreatePartyPayment, CreateWeightSlab, DistanceCategory, Invoice,
    InvoiceLine, InvoiceTotals, NewConsignment, PartyPayment, PaymentAllocation, RatePricing,
    RateSlabKey, ShipmentType, StoredPricing, UpdateWeightSlab, UpsertRateSlab,
};
use crate::services::error::BillingError;
use crate::services::pricing::RateBreakdown;
use crate::services::reconciler::RateOverrides;
use crate::services::resolver::{PartyRef, ResolveRateInput, ResolvedRate};
use crate::services::{Classification, ReferenceTables};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

fn parse_shipment_type(raw: &str) -> Result<ShipmentType, BillingError> {
    ShipmentType::from_code(raw).ok_or_else(|| {
        BillingError::Validation(format!(
            "shipment_type '{}' must be DOCUMENT or NON_DOCUMENT",
            raw
        ))
    })
}

// -----------------------------------------------------------------------------
// Distance classification
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ClassifyDistanceRequest {
    #[validate(length(min = 1, max = 1000))]
    pub origin_address: String,
    #[validate(length(min = 1, max = 1000))]
    pub destination_address: String,
}

#[derive(Debug, Serialize)]
pub struct ClassifyDistanceResponse {
    pub category: DistanceCategory,
    pub title: &'static str,
    pub origin_city: Option<String>,
    pub origin_state: Option<String>,
    pub origin_pincode: Option<String>,
    pub destination_city: Option<String>,
    pub destination_state: Option<String>,
    pub destination_pincode: Option<String>,
    pub is_neighbor: bool,
    pub is_metro_pair: bool,
}

impl ClassifyDistanceResponse {
    /// `None` when the pair could not be classified.
    pub fn from_classification(c: Classification) -> Option<Self> {
        let category = c.category?;
        Some(Self {
            category,
            title: category.title(),
            origin_city: c.origin.city,
            origin_state: c.origin.state_code,
            origin_pincode: c.origin.pincode,
            destination_city: c.destination.city,
            destination_state: c.destination.state_code,
            destination_pincode: c.destination.pincode,
            is_neighbor: c.is_neighbor,
            is_metro_pair: c.is_metro_pair,
        })
    }
}

/// Sizes of the freshly loaded reference tables; `None` when a load failed.
#[derive(Debug, Serialize)]
pub struct ReferenceReloadResponse {
    pub complete: bool,
    pub metro_cities: Option<usize>,
    pub state_adjacencies: Option<usize>,
}

impl ReferenceReloadResponse {
    pub fn from_tables(tables: &ReferenceTables) -> Self {
        Self {
            complete: tables.is_complete(),
            metro_cities: tables.metro_city_count(),
            state_adjacencies: tables.adjacency_count(),
        }
    }
}

// -----------------------------------------------------------------------------
// Rate resolution
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ResolveRateRequest {
    pub party_id: Option<Uuid>,
    #[validate(length(min = 1, max = 255))]
    pub party_name: Option<String>,
    pub shipment_type: String,
    #[validate(length(min = 1, max = 32))]
    pub mode_code: String,
    #[validate(length(min = 1, max = 32))]
    pub service_type_code: String,
    pub origin_address: Option<String>,
    pub destination_address: Option<String>,
    pub region_title: Option<String>,
    #[validate(range(min = 1))]
    pub distance_slab_id: Option<i32>,
    #[validate(range(min = 0))]
    pub weight_grams: Option<i32>,
    #[validate(range(min = 1))]
    pub weight_slab_id: Option<i32>,
}

impl ResolveRateRequest {
    pub fn into_input(self) -> Result<ResolveRateInput, BillingError> {
        let party = match (self.party_id, self.party_name) {
            (Some(id), _) => PartyRef::Id(id),
            (None, Some(name)) => PartyRef::Name(name),
            (None, None) => {
                return Err(BillingError::Validation(
                    "party_id or party_name is required".to_string(),
                ))
            }
        };

        Ok(ResolveRateInput {
            party,
            shipment_type: parse_shipment_type(&self.shipment_type)?,
            mode_code: self.mode_code,
            service_type_code: self.service_type_code,
            origin_address: self.origin_address,
            destination_address: self.destination_address,
            region_title: self.region_title,
            distance_slab_id: self.distance_slab_id,
            weight_grams: self.weight_grams,
            weight_slab_id: self.weight_slab_id,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ResolveRateResponse {
    pub rate_slab_id: Uuid,
    pub party_id: Uuid,
    pub rate: Decimal,
    pub distance_slab_id: i32,
    pub distance_category: String,
    pub distance_title: String,
    pub weight_slab_id: i32,
    pub weight_slab_label: String,
    pub origin_state: Option<String>,
    pub destination_state: Option<String>,
    pub breakdown: RateBreakdown,
}

impl From<ResolvedRate> for ResolveRateResponse {
    fn from(r: ResolvedRate) -> Self {
        let (origin_state, destination_state) = match r.classification {
            Some(c) => (c.origin.state_code, c.destination.state_code),
            None => (None, None),
        };
        Self {
            rate_slab_id: r.rate_slab.rate_slab_id,
            party_id: r.key.party_id,
            rate: r.rate_slab.rate,
            distance_slab_id: r.distance_slab.distance_slab_id,
            distance_category: r.distance_slab.code,
            distance_title: r.distance_slab.title,
            weight_slab_id: r.weight_slab.weight_slab_id,
            weight_slab_label: r.weight_slab.label,
            origin_state,
            destination_state,
            breakdown: r.breakdown,
        }
    }
}

// -----------------------------------------------------------------------------
// Rate slabs
// -----------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct RateSlabRequest {
    pub party_id: Uuid,
    pub shipment_type: String,
    #[validate(range(min = 1))]
    pub mode_id: i32,
    #[validate(range(min = 1))]
    pub service_type_id: i32,
    #[validate(range(min = 1))]
    pub distance_slab_id: i32,
    #[validate(range(min = 1))]
    pub weight_slab_id: i32,
    pub rate: Decimal,
    #[serde(default)]
    pub fuel_pct: Decimal,
    #[serde(default)]
    pub packing: Decimal,
    #[serde(default)]
    pub handling: Decimal,
    #[serde(default)]
    pub gst_pct: Decimal,
}

impl RateSlabRequest {
    pub fn to_upsert(&self) -> Result<UpsertRateSlab, BillingError> {
        Ok(UpsertRateSlab {
            key: RateSlabKey {
                party_id: self.party_id,
                shipment_type: parse_shipment_type(&self.shipment_type)?,
                mode_id: self.mode_id,
                service_type_id: self.service_type_id,
                distance_slab_id: self.distance_slab_id,
                weight_slab_id: self.weight_slab_id,
            },
            pricing: RatePricing {
                rate: self.rate,
                fuel_pct: self.fuel_pct,
                packing: self.packing,
                handling: self.handling,
                gst_pct: self.gst_pct,
            },
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct BatchRateSlabRequest {
    #[validate(length(min = 1, max = 500), nested)]
    pub slabs: Vec<RateSlabRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ListRateSlabsQuery {
    pub party_id: Option<Uuid>,
    pub active_only: Option<bool>,
    pub page_size: Option<i32>,
    pub page_token: Option<Uuid>,
}

// -----------------------------------------------------------------------------
// Weight slabs
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateWeightSlabRequest {
    #[validate(length(min = 1, max = 64))]
    pub label: String,
    #[validate(range(min = 0))]
    pub min_grams: i32,
    #[validate(range(min = 1))]
    pub max_grams: i32,
}

impl From<CreateWeightSlabRequest> for CreateWeightSlab {
    fn from(r: CreateWeightSlabRequest) -> Self {
        Self {
            label: r.label,
            min_grams: r.min_grams,
            max_grams: r.max_grams,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UpdateWeightSlabRequest {
    #[validate(length(min = 1, max = 64))]
    pub label: Option<String>,
    #[validate(range(min = 0))]
    pub min_grams: Option<i32>,
    #[validate(range(min = 1))]
    pub max_grams: Option<i32>,
    pub active: Option<bool>,
}

impl From<UpdateWeightSlabRequest> for UpdateWeightSlab {
    fn from(r: UpdateWeightSlabRequest) -> Self {
        Self {
            label: r.label,
            min_grams: r.min_grams,
            max_grams: r.max_grams,
            active: r.active,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListWeightSlabsQuery {
    pub include_inactive: Option<bool>,
}

// -----------------------------------------------------------------------------
// Consignments
// -----------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ConsignmentRow {
    #[validate(length(min = 1, max = 64))]
    pub consignment_number: String,
    #[validate(length(max = 255))]
    pub party_name: Option<String>,
    pub shipment_date: NaiveDate,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub weight_grams: i32,
    pub origin_address: Option<String>,
    pub destination_address: Option<String>,
    pub pricing_meta: Option<StoredPricing>,
    pub calculated_amount: Option<Decimal>,
    pub final_collected: Option<Decimal>,
    pub retail_price: Option<Decimal>,
}

impl From<ConsignmentRow> for NewConsignment {
    fn from(r: ConsignmentRow) -> Self {
        Self {
            consignment_number: r.consignment_number,
            party_name: r.party_name,
            shipment_date: r.shipment_date,
            weight_grams: r.weight_grams,
            origin_address: r.origin_address,
            destination_address: r.destination_address,
            pricing_meta: r.pricing_meta,
            calculated_amount: r.calculated_amount,
            final_collected: r.final_collected,
            retail_price: r.retail_price,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ImportConsignmentsRequest {
    #[validate(length(min = 1, max = 1000), nested)]
    pub consignments: Vec<ConsignmentRow>,
}

// -----------------------------------------------------------------------------
// Invoices
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ReconcileInvoiceRequest {
    #[validate(length(min = 1, max = 1000))]
    pub consignment_ids: Vec<Uuid>,
    #[validate(length(max = 255))]
    pub party_name: Option<String>,
    pub overrides: Option<RateOverrides>,
    pub additional_charges: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct ReconcileInvoiceResponse {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub party_id: Uuid,
    pub totals: InvoiceTotals,
    pub line_count: usize,
}

impl ReconcileInvoiceResponse {
    pub fn new(invoice: &Invoice, line_count: usize) -> Self {
        Self {
            invoice_id: invoice.invoice_id,
            invoice_number: invoice.invoice_number.clone(),
            party_id: invoice.party_id,
            totals: InvoiceTotals {
                subtotal: invoice.subtotal,
                tax_amount: invoice.tax_amount,
                additional_charges: invoice.additional_charges,
                total_amount: invoice.total_amount,
            },
            line_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub outstanding_amount: Decimal,
    pub lines: Vec<InvoiceLine>,
}

impl InvoiceResponse {
    pub fn new(invoice: Invoice, lines: Vec<InvoiceLine>) -> Self {
        Self {
            outstanding_amount: invoice.outstanding(),
            invoice,
            lines,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceBalance {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub total_amount: Decimal,
    pub received_amount: Decimal,
    pub outstanding_amount: Decimal,
}

impl From<&Invoice> for InvoiceBalance {
    fn from(i: &Invoice) -> Self {
        Self {
            invoice_id: i.invoice_id,
            invoice_number: i.invoice_number.clone(),
            total_amount: i.total_amount,
            received_amount: i.received_amount,
            outstanding_amount: i.outstanding(),
        }
    }
}

// -----------------------------------------------------------------------------
// Payments
// -----------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AllocationRequest {
    pub invoice_id: Uuid,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct RecordPaymentRequest {
    pub party_id: Uuid,
    pub amount: Decimal,
    pub payment_date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 32))]
    pub method: String,
    #[validate(length(max = 128))]
    pub reference: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub allocations: Vec<AllocationRequest>,
}

impl RecordPaymentRequest {
    pub fn into_input(self, today: NaiveDate) -> CreatePartyPayment {
        CreatePartyPayment {
            party_id: self.party_id,
            amount: self.amount,
            payment_date: self.payment_date.unwrap_or(today),
            method: self.method.trim().to_uppercase(),
            reference: self.reference,
            notes: self.notes,
            allocations: self
                .allocations
                .into_iter()
                .map(|a| AllocationInput {
                    invoice_id: a.invoice_id,
                    amount: a.amount,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecordPaymentResponse {
    pub payment: PartyPayment,
    pub allocations: Vec<PaymentAllocation>,
    pub updated_invoice_balances: Vec<InvoiceBalance>,
}

#[derive(Debug, Deserialize)]
pub struct BillingStatusQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}
