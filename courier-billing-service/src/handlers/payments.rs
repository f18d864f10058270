use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use service_core::middleware::Actor;
use validator::Validate;

use crate::{
    dtos::{InvoiceBalance, RecordPaymentRequest, RecordPaymentResponse},
    services::BillingError,
    startup::AppState,
};

/// Record a party payment and allocate it against that party's invoices.
pub async fn record_payment(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<RecordPaymentResponse>), BillingError> {
    payload.validate()?;
    let input = payload.into_input(Utc::now().date_naive());

    tracing::info!(
        party_id = %input.party_id,
        amount = %input.amount,
        allocations = input.allocations.len(),
        actor = %actor.as_str(),
        "Recording payment"
    );

    let (payment, allocations, invoices) =
        state.db.record_payment(&input, actor.as_str()).await?;

    Ok((
        StatusCode::CREATED,
        Json(RecordPaymentResponse {
            payment,
            allocations,
            updated_invoice_balances: invoices.iter().map(InvoiceBalance::from).collect(),
        }),
    ))
}
