use axum::{extract::State, http::StatusCode, Json};
use validator::Validate;

use crate::{
    dtos::ImportConsignmentsRequest,
    models::{Consignment, NewConsignment},
    services::BillingError,
    startup::AppState,
};

/// Store parsed upload rows as unbilled consignments. A duplicate
/// consignment number rejects the whole upload.
pub async fn import_consignments(
    State(state): State<AppState>,
    Json(payload): Json<ImportConsignmentsRequest>,
) -> Result<(StatusCode, Json<Vec<Consignment>>), BillingError> {
    payload.validate()?;

    let rows: Vec<NewConsignment> = payload
        .consignments
        .into_iter()
        .map(NewConsignment::from)
        .collect();

    tracing::info!(count = rows.len(), "Importing consignments");

    let stored = state.db.import_consignments(&rows).await?;

    Ok((StatusCode::CREATED, Json(stored)))
}
