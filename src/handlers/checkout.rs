use crate::{
    entities::PaymentMethod,
    errors::ServiceError,
    handlers::common::{customer_identity, success_response},
    AppState,
};
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(begin_checkout))
        .route("/payment", post(create_payment))
}

pub fn order_routes() -> Router<Arc<AppState>> {
    Router::new().route("/:id/invoice", get(invoice))
}

async fn begin_checkout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServiceError> {
    let customer_id = customer_identity(&headers)?;
    let order = state.services.checkout.begin_checkout(customer_id).await?;
    Ok(success_response(order))
}

#[derive(Debug, Deserialize)]
struct CreatePaymentRequest {
    method: PaymentMethod,
}

async fn create_payment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreatePaymentRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let customer_id = customer_identity(&headers)?;
    let payment = state
        .services
        .checkout
        .create_or_get_payment(customer_id, payload.method)
        .await?;
    Ok(success_response(payment))
}

async fn invoice(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(order_id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    let customer_id = customer_identity(&headers)?;
    let invoice = state
        .services
        .checkout
        .invoice_data(customer_id, order_id)
        .await?;
    Ok(success_response(invoice))
}
