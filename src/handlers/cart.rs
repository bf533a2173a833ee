use crate::{
    errors::ServiceError,
    handlers::common::{customer_identity, no_content_response, success_response, validate_input},
    services::cart::AddItemInput,
    AppState,
};
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_cart))
        .route("/items", post(add_item))
        .route("/items/:id", put(set_quantity))
        .route("/items/:id", delete(remove_item))
        .route("/clear", post(clear_cart))
        .route("/whatsapp-link", get(whatsapp_link))
}

async fn get_cart(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServiceError> {
    let customer_id = customer_identity(&headers)?;
    let cart = state.services.cart.get_cart(customer_id).await?;
    Ok(success_response(cart))
}

#[derive(Debug, Deserialize, Validate)]
struct AddItemRequest {
    product_id: i64,
    packsize: Option<String>,
    #[validate(range(min = 1))]
    quantity: i32,
}

async fn add_item(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<AddItemRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let customer_id = customer_identity(&headers)?;
    validate_input(&payload)?;

    let item = state
        .services
        .cart
        .add_item(
            customer_id,
            AddItemInput {
                product_id: payload.product_id,
                packsize: payload.packsize,
                quantity: payload.quantity,
            },
        )
        .await?;

    Ok(success_response(item))
}

#[derive(Debug, Deserialize, Validate)]
struct SetQuantityRequest {
    #[validate(range(min = 1))]
    quantity: i32,
}

async fn set_quantity(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(item_id): Path<i64>,
    Json(payload): Json<SetQuantityRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let customer_id = customer_identity(&headers)?;
    validate_input(&payload)?;

    let item = state
        .services
        .cart
        .set_quantity(customer_id, item_id, payload.quantity)
        .await?;

    Ok(success_response(item))
}

async fn remove_item(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(item_id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    let customer_id = customer_identity(&headers)?;
    state.services.cart.remove_item(customer_id, item_id).await?;
    Ok(no_content_response())
}

async fn clear_cart(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServiceError> {
    let customer_id = customer_identity(&headers)?;
    state.services.cart.clear(customer_id).await?;
    Ok(no_content_response())
}

async fn whatsapp_link(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServiceError> {
    let customer_id = customer_identity(&headers)?;
    let link = state
        .services
        .checkout
        .order_details_link(customer_id)
        .await?;
    Ok(success_response(serde_json::json!({ "link": link })))
}
