//! Rate slab registry endpoints. Every mutation is attributed to the
//! calling operator in the audit trail.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::middleware::Actor;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{BatchRateSlabRequest, ListRateSlabsQuery, RateSlabRequest},
    models::{ListRateSlabsFilter, PartyRateSlab, RateAudit},
    services::{BillingError, RateSlabRegistry},
    startup::AppState,
};

const DEFAULT_PAGE_SIZE: i32 = 100;

pub async fn list_rate_slabs(
    State(state): State<AppState>,
    Query(query): Query<ListRateSlabsQuery>,
) -> Result<Json<Vec<PartyRateSlab>>, BillingError> {
    let filter = ListRateSlabsFilter {
        party_id: query.party_id,
        active_only: query.active_only.unwrap_or(true),
        page_size: query.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        page_token: query.page_token,
    };

    let slabs = RateSlabRegistry::new(&state.db).list(&filter).await?;
    Ok(Json(slabs))
}

/// Create a slab, or update the one holding the same key.
pub async fn upsert_rate_slab(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<RateSlabRequest>,
) -> Result<Json<PartyRateSlab>, BillingError> {
    payload.validate()?;
    let input = payload.to_upsert()?;

    tracing::info!(
        party_id = %input.key.party_id,
        shipment_type = input.key.shipment_type.as_str(),
        actor = %actor.as_str(),
        "Upserting rate slab"
    );

    let slab = RateSlabRegistry::new(&state.db)
        .upsert(&input, actor.as_str())
        .await?;

    Ok(Json(slab))
}

pub async fn upsert_rate_slabs_batch(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<BatchRateSlabRequest>,
) -> Result<Json<Vec<PartyRateSlab>>, BillingError> {
    payload.validate()?;
    let inputs = payload
        .slabs
        .iter()
        .map(RateSlabRequest::to_upsert)
        .collect::<Result<Vec<_>, _>>()?;

    tracing::info!(
        count = inputs.len(),
        actor = %actor.as_str(),
        "Upserting rate slab batch"
    );

    let slabs = RateSlabRegistry::new(&state.db)
        .upsert_batch(&inputs, actor.as_str())
        .await?;

    Ok(Json(slabs))
}

/// Rewrite a slab by id. Moving it onto a key another slab holds is rejected.
pub async fn update_rate_slab(
    State(state): State<AppState>,
    actor: Actor,
    Path(rate_slab_id): Path<Uuid>,
    Json(payload): Json<RateSlabRequest>,
) -> Result<Json<PartyRateSlab>, BillingError> {
    payload.validate()?;
    let input = payload.to_upsert()?;

    tracing::info!(
        rate_slab_id = %rate_slab_id,
        actor = %actor.as_str(),
        "Updating rate slab"
    );

    let slab = RateSlabRegistry::new(&state.db)
        .update(rate_slab_id, &input, actor.as_str())
        .await?;

    Ok(Json(slab))
}

pub async fn deactivate_rate_slab(
    State(state): State<AppState>,
    actor: Actor,
    Path(rate_slab_id): Path<Uuid>,
) -> Result<Json<PartyRateSlab>, BillingError> {
    tracing::info!(
        rate_slab_id = %rate_slab_id,
        actor = %actor.as_str(),
        "Deactivating rate slab"
    );

    let slab = RateSlabRegistry::new(&state.db)
        .deactivate(rate_slab_id, actor.as_str())
        .await?;

    Ok(Json(slab))
}

pub async fn rate_slab_audit(
    State(state): State<AppState>,
    Path(rate_slab_id): Path<Uuid>,
) -> Result<(StatusCode, Json<Vec<RateAudit>>), BillingError> {
    state
        .db
        .get_rate_slab(rate_slab_id)
        .await?
        .ok_or_else(|| BillingError::NotFound(format!("Rate slab {} not found", rate_slab_id)))?;

    let trail = RateSlabRegistry::new(&state.db)
        .audit_trail(rate_slab_id)
        .await?;

    Ok((StatusCode::OK, Json(trail)))
}
