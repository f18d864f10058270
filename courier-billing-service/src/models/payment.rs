//! Party payment and allocation models.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Payment received from a party, split across invoices by allocations.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PartyPayment {
    pub payment_id: Uuid,
    pub party_id: Uuid,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub method: String,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_by: String,
    pub created_utc: DateTime<Utc>,
}

/// Portion of a payment applied to one invoice.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentAllocation {
    pub allocation_id: Uuid,
    pub payment_id: Uuid,
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub created_utc: DateTime<Utc>,
}

/// Requested allocation of a payment to an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationInput {
    pub invoice_id: Uuid,
    pub amount: Decimal,
}

/// Input for recording a party payment.
#[derive(Debug, Clone)]
pub struct CreatePartyPayment {
    pub party_id: Uuid,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub method: String,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub allocations: Vec<AllocationInput>,
}
