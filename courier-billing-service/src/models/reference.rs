//! Reference tables used by classification and rate resolution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Coarse geographic category driving rate selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistanceCategory {
    MetroCities,
    WithinState,
    OutOfState,
    OtherState,
}

impl DistanceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceCategory::MetroCities => "METRO_CITIES",
            DistanceCategory::WithinState => "WITHIN_STATE",
            DistanceCategory::OutOfState => "OUT_OF_STATE",
            DistanceCategory::OtherState => "OTHER_STATE",
        }
    }

    /// Display title matching the seeded `distance_slabs.title`.
    pub fn title(&self) -> &'static str {
        match self {
            DistanceCategory::MetroCities => "Metro Cities",
            DistanceCategory::WithinState => "Within State",
            DistanceCategory::OutOfState => "Out of State",
            DistanceCategory::OtherState => "Other State",
        }
    }
}

/// Whether a consignment carries documents only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentType {
    Document,
    NonDocument,
}

impl ShipmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentType::Document => "DOCUMENT",
            ShipmentType::NonDocument => "NON_DOCUMENT",
        }
    }

    pub fn from_code(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().replace(['-', ' '], "_").as_str() {
            "DOCUMENT" | "DOC" => Some(ShipmentType::Document),
            "NON_DOCUMENT" | "NON_DOC" => Some(ShipmentType::NonDocument),
            _ => None,
        }
    }
}

/// Transport mode (air, surface).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Mode {
    pub mode_id: i32,
    pub code: String,
    pub title: String,
    pub active: bool,
}

/// Service level (standard, express, ...).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ServiceType {
    pub service_type_id: i32,
    pub code: String,
    pub title: String,
    pub active: bool,
}

/// Lookup row backing a [`DistanceCategory`].
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DistanceSlab {
    pub distance_slab_id: i32,
    pub code: String,
    pub title: String,
    pub active: bool,
}

/// Gram-weight bucket; the range is `[min_grams, max_grams)`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WeightSlab {
    pub weight_slab_id: i32,
    pub label: String,
    pub min_grams: i32,
    pub max_grams: i32,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl WeightSlab {
    pub fn contains(&self, grams: i32) -> bool {
        self.min_grams <= grams && grams < self.max_grams
    }

    pub fn overlaps(&self, min_grams: i32, max_grams: i32) -> bool {
        self.min_grams < max_grams && min_grams < self.max_grams
    }
}

/// Input for creating a weight slab.
#[derive(Debug, Clone)]
pub struct CreateWeightSlab {
    pub label: String,
    pub min_grams: i32,
    pub max_grams: i32,
}

/// Input for editing a weight slab.
#[derive(Debug, Clone, Default)]
pub struct UpdateWeightSlab {
    pub label: Option<String>,
    pub min_grams: Option<i32>,
    pub max_grams: Option<i32>,
    pub active: Option<bool>,
}
