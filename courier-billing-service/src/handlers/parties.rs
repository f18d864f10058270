use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::{
    dtos::BillingStatusQuery,
    services::{reconciler::BillingSummary, BillingError},
    startup::AppState,
};

/// Unbilled, billed and paid totals for a party with the derived status.
pub async fn billing_status(
    State(state): State<AppState>,
    Path(party_id): Path<Uuid>,
    Query(query): Query<BillingStatusQuery>,
) -> Result<Json<BillingSummary>, BillingError> {
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(BillingError::Validation(
                "from must not be after to".to_string(),
            ));
        }
    }

    let summary = state
        .db
        .billing_summary(party_id, query.from, query.to)
        .await?;

    Ok(Json(summary))
}
