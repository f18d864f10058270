//! Consignment (booking) rows consumed by reconciliation.

use super::Party;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One priced shipment event. `invoice_id` is `None` while unbilled.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Consignment {
    pub consignment_id: Uuid,
    pub consignment_number: String,
    pub party_name: Option<String>,
    pub shipment_date: NaiveDate,
    pub weight_grams: i32,
    pub origin_address: Option<String>,
    pub destination_address: Option<String>,
    pub pricing_meta: Option<serde_json::Value>,
    pub calculated_amount: Option<Decimal>,
    pub final_collected: Option<Decimal>,
    pub retail_price: Option<Decimal>,
    pub invoice_id: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
}

impl Consignment {
    /// Trimmed, lower-cased sender name, or `None` when blank.
    pub fn normalized_party(&self) -> Option<String> {
        self.party_name
            .as_deref()
            .map(Party::normalize_name)
            .filter(|name| !name.is_empty())
    }

    /// Stored pre-tax amount, falling back from the calculated amount to the
    /// collected amount to the retail price, then zero.
    pub fn stored_amount(&self) -> Decimal {
        self.calculated_amount
            .or(self.final_collected)
            .or(self.retail_price)
            .unwrap_or(Decimal::ZERO)
    }

    /// Rate breakup captured when the row was priced, if any. A meta that
    /// does not parse is an error, never an empty breakup.
    pub fn stored_pricing(&self) -> Result<Option<StoredPricing>, serde_json::Error> {
        self.pricing_meta
            .as_ref()
            .map(|meta| StoredPricing::deserialize(meta))
            .transpose()
    }
}

/// Rate breakup persisted on a consignment by the booking flow.
///
/// All fields are optional because rows arrive from CSV imports of varying
/// vintage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoredPricing {
    #[serde(default)]
    pub base: Option<Decimal>,
    #[serde(default)]
    pub fuel: Option<Decimal>,
    #[serde(default)]
    pub packing: Option<Decimal>,
    #[serde(default)]
    pub handling: Option<Decimal>,
    #[serde(default)]
    pub gst_pct: Option<Decimal>,
    #[serde(default)]
    pub gst: Option<Decimal>,
}

/// Parsed upload row to be stored as an unbilled consignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewConsignment {
    pub consignment_number: String,
    pub party_name: Option<String>,
    pub shipment_date: NaiveDate,
    pub weight_grams: i32,
    pub origin_address: Option<String>,
    pub destination_address: Option<String>,
    pub pricing_meta: Option<StoredPricing>,
    pub calculated_amount: Option<Decimal>,
    pub final_collected: Option<Decimal>,
    pub retail_price: Option<Decimal>,
}

impl NewConsignment {
    /// Matching key stored alongside the display name.
    pub fn normalized_party(&self) -> Option<String> {
        self.party_name
            .as_deref()
            .map(Party::normalize_name)
            .filter(|name| !name.is_empty())
    }
}
