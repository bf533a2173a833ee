use crate::{
    errors::ServiceError,
    handlers::common::success_response,
    AppState,
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Operator endpoints for the payment state machine. The storefront's admin
/// UI (out of scope here) is the caller.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:id", get(get_payment))
        .route("/:id/success", post(mark_success))
        .route("/:id/failed", post(mark_failed))
        .route("/:id/cancelled", post(mark_cancelled))
        .route("/:id/reset", post(reset_to_pending))
}

async fn get_payment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    let payment = state.services.payments.get_payment(id).await?;
    Ok(success_response(payment))
}

#[derive(Debug, Default, Deserialize)]
struct MarkSuccessRequest {
    /// External gateway reference, when the operator has one.
    payment_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct MarkSuccessResponse {
    payment: crate::entities::PaymentModel,
    /// Deep link the operator can open to send the confirmation, when the
    /// notification trigger fired.
    notification: Option<String>,
}

async fn mark_success(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    payload: Option<Json<MarkSuccessRequest>>,
) -> Result<impl IntoResponse, ServiceError> {
    let external = payload.and_then(|Json(p)| p.payment_id);
    let outcome = state.services.payments.mark_success(id, external).await?;
    Ok(success_response(MarkSuccessResponse {
        payment: outcome.payment,
        notification: outcome.notification,
    }))
}

async fn mark_failed(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    let payment = state.services.payments.mark_failed(id).await?;
    Ok(success_response(payment))
}

async fn mark_cancelled(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    let payment = state.services.payments.mark_cancelled(id).await?;
    Ok(success_response(payment))
}

async fn reset_to_pending(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    let payment = state.services.payments.reset_to_pending(id).await?;
    Ok(success_response(payment))
}
