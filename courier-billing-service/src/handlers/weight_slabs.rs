use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::{
    dtos::{CreateWeightSlabRequest, ListWeightSlabsQuery, UpdateWeightSlabRequest},
    models::{CreateWeightSlab, UpdateWeightSlab, WeightSlab},
    services::BillingError,
    startup::AppState,
};

fn not_found(weight_slab_id: i32) -> BillingError {
    BillingError::NotFound(format!("Weight slab {} not found", weight_slab_id))
}

pub async fn list_weight_slabs(
    State(state): State<AppState>,
    Query(query): Query<ListWeightSlabsQuery>,
) -> Result<Json<Vec<WeightSlab>>, AppError> {
    let slabs = state
        .db
        .list_weight_slabs(query.include_inactive.unwrap_or(false))
        .await?;
    Ok(Json(slabs))
}

pub async fn create_weight_slab(
    State(state): State<AppState>,
    Json(payload): Json<CreateWeightSlabRequest>,
) -> Result<(StatusCode, Json<WeightSlab>), BillingError> {
    payload.validate()?;

    tracing::info!(
        label = %payload.label,
        min_grams = payload.min_grams,
        max_grams = payload.max_grams,
        "Creating weight slab"
    );

    let slab = state
        .db
        .create_weight_slab(&CreateWeightSlab::from(payload))
        .await?;

    Ok((StatusCode::CREATED, Json(slab)))
}

pub async fn update_weight_slab(
    State(state): State<AppState>,
    Path(weight_slab_id): Path<i32>,
    Json(payload): Json<UpdateWeightSlabRequest>,
) -> Result<Json<WeightSlab>, BillingError> {
    payload.validate()?;

    tracing::info!(weight_slab_id = weight_slab_id, "Updating weight slab");

    let slab = state
        .db
        .update_weight_slab(weight_slab_id, &UpdateWeightSlab::from(payload))
        .await?
        .ok_or_else(|| not_found(weight_slab_id))?;

    Ok(Json(slab))
}

/// Weight slabs are never hard-deleted; rate slabs may still point at them.
pub async fn deactivate_weight_slab(
    State(state): State<AppState>,
    Path(weight_slab_id): Path<i32>,
) -> Result<Json<WeightSlab>, BillingError> {
    tracing::info!(weight_slab_id = weight_slab_id, "Deactivating weight slab");

    let slab = state
        .db
        .deactivate_weight_slab(weight_slab_id)
        .await?
        .ok_or_else(|| not_found(weight_slab_id))?;

    Ok(Json(slab))
}
