use axum::{extract::State, Json};
use validator::Validate;

use crate::{
    dtos::{ResolveRateRequest, ResolveRateResponse},
    services::{BillingError, DbCatalog, RateResolver},
    startup::AppState,
};

/// Resolve the configured rate for a shipment profile.
pub async fn resolve_rate(
    State(state): State<AppState>,
    Json(payload): Json<ResolveRateRequest>,
) -> Result<Json<ResolveRateResponse>, BillingError> {
    payload.validate()?;
    let input = payload.into_input()?;

    let catalog = DbCatalog::new(&state.db, &state.reference_cache);
    let resolved = RateResolver::new(&catalog).resolve(&input).await?;

    tracing::info!(
        rate_slab_id = %resolved.rate_slab.rate_slab_id,
        party_id = %resolved.key.party_id,
        distance_slab_id = resolved.distance_slab.distance_slab_id,
        weight_slab_id = resolved.weight_slab.weight_slab_id,
        total = %resolved.breakdown.total,
        "Rate resolved"
    );

    Ok(Json(ResolveRateResponse::from(resolved)))
}
