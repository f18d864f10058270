//! Billing client model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A billing client (sender).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Party {
    pub party_id: Uuid,
    pub name: String,
    pub normalized_name: String,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
}

impl Party {
    /// Normalized form used for party matching: trimmed and lower-cased.
    pub fn normalize_name(name: &str) -> String {
        name.trim().to_lowercase()
    }
}
