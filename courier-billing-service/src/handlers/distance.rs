use axum::{extract::State, Json};
use service_core::middleware::Actor;
use validator::Validate;

use crate::{
    dtos::{ClassifyDistanceRequest, ClassifyDistanceResponse, ReferenceReloadResponse},
    services::{AddressClassifier, BillingError},
    startup::AppState,
};

/// Classify an origin/destination pair into a distance category.
pub async fn classify_distance(
    State(state): State<AppState>,
    Json(payload): Json<ClassifyDistanceRequest>,
) -> Result<Json<ClassifyDistanceResponse>, BillingError> {
    payload.validate()?;

    let tables = state.reference_cache.get(state.db.as_ref()).await;
    let classification = AddressClassifier::new(&tables)
        .classify(&payload.origin_address, &payload.destination_address);

    tracing::info!(
        category = ?classification.category,
        origin_state = ?classification.origin.state_code,
        destination_state = ?classification.destination.state_code,
        "Classified distance"
    );

    let Some(response) = ClassifyDistanceResponse::from_classification(classification.clone())
    else {
        return Err(BillingError::DistanceCategoryUnresolvable {
            origin_address: Some(payload.origin_address),
            destination_address: Some(payload.destination_address),
            origin_state: classification.origin.state_code,
            destination_state: classification.destination.state_code,
            region_title: None,
        });
    };

    Ok(Json(response))
}

/// Drop the cached metro and adjacency tables and load them again, so edits
/// to the reference tables apply before the TTL runs out.
pub async fn reload_reference_tables(
    State(state): State<AppState>,
    actor: Actor,
) -> Json<ReferenceReloadResponse> {
    state.reference_cache.invalidate().await;
    let tables = state.reference_cache.get(state.db.as_ref()).await;

    tracing::info!(
        actor = %actor.as_str(),
        complete = tables.is_complete(),
        "Reference tables reloaded"
    );

    Json(ReferenceReloadResponse::from_tables(&tables))
}
