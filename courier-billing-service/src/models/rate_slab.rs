//! Party rate slab and audit models.

use super::ShipmentType;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The resolvable rate record for one party and shipment profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PartyRateSlab {
    pub rate_slab_id: Uuid,
    pub party_id: Uuid,
    pub shipment_type: String,
    pub mode_id: i32,
    pub service_type_id: i32,
    pub distance_slab_id: i32,
    pub weight_slab_id: i32,
    pub rate: Decimal,
    pub fuel_pct: Decimal,
    pub packing: Decimal,
    pub handling: Decimal,
    pub gst_pct: Decimal,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl PartyRateSlab {
    pub fn key(&self) -> Option<RateSlabKey> {
        Some(RateSlabKey {
            party_id: self.party_id,
            shipment_type: ShipmentType::from_code(&self.shipment_type)?,
            mode_id: self.mode_id,
            service_type_id: self.service_type_id,
            distance_slab_id: self.distance_slab_id,
            weight_slab_id: self.weight_slab_id,
        })
    }

    pub fn pricing(&self) -> RatePricing {
        RatePricing {
            rate: self.rate,
            fuel_pct: self.fuel_pct,
            packing: self.packing,
            handling: self.handling,
            gst_pct: self.gst_pct,
        }
    }
}

/// Business key; at most one rate slab exists per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RateSlabKey {
    pub party_id: Uuid,
    pub shipment_type: ShipmentType,
    pub mode_id: i32,
    pub service_type_id: i32,
    pub distance_slab_id: i32,
    pub weight_slab_id: i32,
}

/// Pricing fields of a rate slab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatePricing {
    pub rate: Decimal,
    pub fuel_pct: Decimal,
    pub packing: Decimal,
    pub handling: Decimal,
    pub gst_pct: Decimal,
}

/// Create-or-update input keyed by the business key.
#[derive(Debug, Clone)]
pub struct UpsertRateSlab {
    pub key: RateSlabKey,
    pub pricing: RatePricing,
}

/// Filter parameters for listing rate slabs.
#[derive(Debug, Clone, Default)]
pub struct ListRateSlabsFilter {
    pub party_id: Option<Uuid>,
    pub active_only: bool,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

/// Kind of rate slab mutation recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
        }
    }
}

/// Append-only audit row, one per rate slab mutation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RateAudit {
    pub audit_id: Uuid,
    pub rate_slab_id: Uuid,
    pub action: String,
    pub before_snapshot: Option<serde_json::Value>,
    pub after_snapshot: Option<serde_json::Value>,
    pub actor: String,
    pub created_utc: DateTime<Utc>,
}
