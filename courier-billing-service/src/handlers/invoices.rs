//! Invoice endpoints: reconciliation of unbilled consignments, lookup,
//! deletion and received-amount recompute.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::middleware::Actor;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{InvoiceBalance, InvoiceResponse, ReconcileInvoiceRequest, ReconcileInvoiceResponse},
    services::{reconciler::ReconcileRequest, BillingError},
    startup::AppState,
};

fn not_found(invoice_id: Uuid) -> BillingError {
    BillingError::NotFound(format!("Invoice {} not found", invoice_id))
}

/// Bill a batch of consignments for one party as a single invoice.
pub async fn reconcile_invoice(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<ReconcileInvoiceRequest>,
) -> Result<(StatusCode, Json<ReconcileInvoiceResponse>), BillingError> {
    payload.validate()?;

    tracing::info!(
        count = payload.consignment_ids.len(),
        party_name = ?payload.party_name,
        has_overrides = payload.overrides.is_some(),
        actor = %actor.as_str(),
        "Reconciling consignments"
    );

    let request = ReconcileRequest {
        consignment_ids: payload.consignment_ids,
        party_filter: payload.party_name,
        overrides: payload.overrides,
        additional_charges: payload.additional_charges.unwrap_or_default(),
        invoice_prefix: state.config.billing.invoice_number_prefix.clone(),
        actor: actor.0,
    };

    let (invoice, lines) = state.db.reconcile(&request).await?;

    Ok((
        StatusCode::CREATED,
        Json(ReconcileInvoiceResponse::new(&invoice, lines.len())),
    ))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceResponse>, BillingError> {
    let invoice = state
        .db
        .get_invoice(invoice_id)
        .await?
        .ok_or_else(|| not_found(invoice_id))?;
    let lines = state.db.get_invoice_lines(invoice_id).await?;

    Ok(Json(InvoiceResponse::new(invoice, lines)))
}

/// Delete an unpaid invoice; its consignments become billable again.
pub async fn delete_invoice(
    State(state): State<AppState>,
    actor: Actor,
    Path(invoice_id): Path<Uuid>,
) -> Result<StatusCode, BillingError> {
    tracing::info!(
        invoice_id = %invoice_id,
        actor = %actor.as_str(),
        "Deleting invoice"
    );

    if !state.db.delete_invoice(invoice_id).await? {
        return Err(not_found(invoice_id));
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn recompute_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceBalance>, BillingError> {
    let invoice = state
        .db
        .recompute_received(invoice_id)
        .await?
        .ok_or_else(|| not_found(invoice_id))?;

    Ok(Json(InvoiceBalance::from(&invoice)))
}
