//! Invoice model for courier-billing-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Invoice header. Totals are derived from its lines and never hand-edited.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub party_id: Uuid,
    pub invoice_number: String,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub additional_charges: Decimal,
    pub total_amount: Decimal,
    pub received_amount: Decimal,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub created_by: String,
    pub created_utc: DateTime<Utc>,
}

impl Invoice {
    pub fn outstanding(&self) -> Decimal {
        self.total_amount - self.received_amount
    }
}

/// One consignment's priced line on an invoice.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceLine {
    pub invoice_line_id: Uuid,
    pub invoice_id: Uuid,
    pub consignment_id: Uuid,
    pub description: String,
    pub base_amount: Decimal,
    pub fuel_amount: Decimal,
    pub packing: Decimal,
    pub handling: Decimal,
    pub subtotal: Decimal,
    pub gst_amount: Decimal,
    pub total: Decimal,
    pub sort_order: i32,
}

/// Line computed by reconciliation, not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewInvoiceLine {
    pub consignment_id: Uuid,
    pub description: String,
    pub base_amount: Decimal,
    pub fuel_amount: Decimal,
    pub packing: Decimal,
    pub handling: Decimal,
    pub subtotal: Decimal,
    pub gst_amount: Decimal,
    pub total: Decimal,
}

/// Aggregate totals for a set of lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub additional_charges: Decimal,
    pub total_amount: Decimal,
}
