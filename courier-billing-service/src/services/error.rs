//! Expected outcomes of rate resolution and billing, with operator diagnostics.

use crate::models::RateSlabKey;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use service_core::error::AppError;
use thiserror::Error;
use uuid::Uuid;

/// How many offending consignments an `AlreadyInvoiced` error names.
pub const ALREADY_INVOICED_LISTED: usize = 10;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Mode '{mode_code}' is not recognized")]
    ModeNotRecognized { mode_code: String },

    #[error("Service type '{service_type_code}' is not recognized")]
    ServiceTypeNotRecognized { service_type_code: String },

    #[error("Party '{party}' not found")]
    PartyNotFound { party: String },

    #[error("No active weight slab contains {weight_grams} g")]
    NoMatchingWeightSlab { weight_grams: i32 },

    #[error("Distance category could not be resolved")]
    DistanceCategoryUnresolvable {
        origin_address: Option<String>,
        destination_address: Option<String>,
        origin_state: Option<String>,
        destination_state: Option<String>,
        region_title: Option<String>,
    },

    #[error("No rate configured for the resolved shipment profile")]
    NoRateConfigured { key: RateSlabKey },

    #[error("Batch contains consignments for more than one party")]
    MixedPartyBatch { parties: Vec<String> },

    #[error("{} consignment(s) in the batch are already invoiced", .listed.len() + .remaining)]
    AlreadyInvoiced { listed: Vec<String>, remaining: usize },

    #[error("Another rate slab already uses this key")]
    DuplicateMapping { conflicting_rate_slab_id: Uuid },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Internal(#[from] AppError),
}

impl BillingError {
    /// Build an `AlreadyInvoiced` error naming at most ten consignments.
    pub fn already_invoiced(mut consignment_numbers: Vec<String>) -> Self {
        let remaining = consignment_numbers
            .len()
            .saturating_sub(ALREADY_INVOICED_LISTED);
        consignment_numbers.truncate(ALREADY_INVOICED_LISTED);
        BillingError::AlreadyInvoiced {
            listed: consignment_numbers,
            remaining,
        }
    }

    pub fn database(context: &str, err: sqlx::Error) -> Self {
        BillingError::Internal(AppError::DatabaseError(anyhow::anyhow!(
            "{}: {}",
            context,
            err
        )))
    }

    /// Stable identifier for API clients.
    pub fn kind(&self) -> &'static str {
        match self {
            BillingError::ModeNotRecognized { .. } => "MODE_NOT_RECOGNIZED",
            BillingError::ServiceTypeNotRecognized { .. } => "SERVICE_TYPE_NOT_RECOGNIZED",
            BillingError::PartyNotFound { .. } => "PARTY_NOT_FOUND",
            BillingError::NoMatchingWeightSlab { .. } => "NO_MATCHING_WEIGHT_SLAB",
            BillingError::DistanceCategoryUnresolvable { .. } => "DISTANCE_CATEGORY_UNRESOLVABLE",
            BillingError::NoRateConfigured { .. } => "NO_RATE_CONFIGURED",
            BillingError::MixedPartyBatch { .. } => "MIXED_PARTY_BATCH",
            BillingError::AlreadyInvoiced { .. } => "ALREADY_INVOICED",
            BillingError::DuplicateMapping { .. } => "DUPLICATE_MAPPING",
            BillingError::Validation(_) => "VALIDATION_FAILED",
            BillingError::NotFound(_) => "NOT_FOUND",
            BillingError::Conflict(_) => "CONFLICT",
            BillingError::Internal(_) => "INTERNAL",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            BillingError::ModeNotRecognized { .. }
            | BillingError::ServiceTypeNotRecognized { .. }
            | BillingError::PartyNotFound { .. }
            | BillingError::NoMatchingWeightSlab { .. }
            | BillingError::DistanceCategoryUnresolvable { .. }
            | BillingError::NotFound(_) => StatusCode::NOT_FOUND,
            BillingError::NoRateConfigured { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            BillingError::MixedPartyBatch { .. }
            | BillingError::AlreadyInvoiced { .. }
            | BillingError::DuplicateMapping { .. }
            | BillingError::Conflict(_) => StatusCode::CONFLICT,
            BillingError::Validation(_) => StatusCode::BAD_REQUEST,
            BillingError::Internal(e) => e.status_code(),
        }
    }

    /// Operator-facing details: the raw input or resolved key that failed.
    pub fn diagnostics(&self) -> Value {
        match self {
            BillingError::ModeNotRecognized { mode_code } => json!({ "mode_code": mode_code }),
            BillingError::ServiceTypeNotRecognized { service_type_code } => {
                json!({ "service_type_code": service_type_code })
            }
            BillingError::PartyNotFound { party } => json!({ "party": party }),
            BillingError::NoMatchingWeightSlab { weight_grams } => {
                json!({ "weight_grams": weight_grams })
            }
            BillingError::DistanceCategoryUnresolvable {
                origin_address,
                destination_address,
                origin_state,
                destination_state,
                region_title,
            } => json!({
                "origin_address": origin_address,
                "destination_address": destination_address,
                "origin_state": origin_state,
                "destination_state": destination_state,
                "region_title": region_title,
            }),
            BillingError::NoRateConfigured { key } => json!({
                "party_id": key.party_id,
                "shipment_type": key.shipment_type.as_str(),
                "mode_id": key.mode_id,
                "service_type_id": key.service_type_id,
                "distance_slab_id": key.distance_slab_id,
                "weight_slab_id": key.weight_slab_id,
            }),
            BillingError::MixedPartyBatch { parties } => json!({ "parties": parties }),
            BillingError::AlreadyInvoiced { listed, remaining } => json!({
                "consignments": listed,
                "remaining": remaining,
            }),
            BillingError::DuplicateMapping {
                conflicting_rate_slab_id,
            } => json!({ "conflicting_rate_slab_id": conflicting_rate_slab_id }),
            BillingError::Validation(_)
            | BillingError::NotFound(_)
            | BillingError::Conflict(_)
            | BillingError::Internal(_) => Value::Null,
        }
    }
}

impl From<validator::ValidationErrors> for BillingError {
    fn from(err: validator::ValidationErrors) -> Self {
        BillingError::Validation(err.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error_kind: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    diagnostics: Value,
}

impl IntoResponse for BillingError {
    fn into_response(self) -> Response {
        if let BillingError::Internal(err) = self {
            crate::services::metrics::record_error("internal");
            return err.into_response();
        }

        crate::services::metrics::record_error(self.kind());
        let status = self.status_code();
        let body = ErrorBody {
            error_kind: self.kind(),
            message: self.to_string(),
            diagnostics: self.diagnostics(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ShipmentType;

    #[test]
    fn already_invoiced_lists_at_most_ten() {
        let numbers: Vec<String> = (1..=13).map(|n| format!("CN{:03}", n)).collect();
        match BillingError::already_invoiced(numbers) {
            BillingError::AlreadyInvoiced { listed, remaining } => {
                assert_eq!(listed.len(), 10);
                assert_eq!(listed[0], "CN001");
                assert_eq!(remaining, 3);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn already_invoiced_message_counts_all_rows() {
        let err = BillingError::already_invoiced(vec!["A".into(), "B".into()]);
        assert_eq!(err.to_string(), "2 consignment(s) in the batch are already invoiced");
    }

    #[test]
    fn no_rate_configured_reports_full_key() {
        let party_id = Uuid::new_v4();
        let err = BillingError::NoRateConfigured {
            key: RateSlabKey {
                party_id,
                shipment_type: ShipmentType::NonDocument,
                mode_id: 1,
                service_type_id: 2,
                distance_slab_id: 3,
                weight_slab_id: 4,
            },
        };

        let diagnostics = err.diagnostics();
        assert_eq!(diagnostics["party_id"], json!(party_id));
        assert_eq!(diagnostics["shipment_type"], "NON_DOCUMENT");
        assert_eq!(diagnostics["weight_slab_id"], 4);
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn invariant_violations_are_conflicts() {
        let mixed = BillingError::MixedPartyBatch {
            parties: vec!["acme".into(), "zenith".into()],
        };
        let duplicate = BillingError::DuplicateMapping {
            conflicting_rate_slab_id: Uuid::new_v4(),
        };
        assert_eq!(mixed.status_code(), StatusCode::CONFLICT);
        assert_eq!(duplicate.status_code(), StatusCode::CONFLICT);
        assert_eq!(mixed.kind(), "MIXED_PARTY_BATCH");
    }

    #[test]
    fn lookup_failures_echo_raw_input() {
        let err = BillingError::ModeNotRecognized {
            mode_code: "ROCKET".into(),
        };
        assert_eq!(err.diagnostics()["mode_code"], "ROCKET");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
