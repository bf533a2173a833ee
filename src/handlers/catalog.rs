use crate::{
    errors::ServiceError,
    handlers::common::{created_response, success_response},
    services::catalog::{CreateProductInput, UpdateProductInput},
    AppState, ListQuery,
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/:id", get(get_product).put(update_product))
        .route("/slug/:slug", get(get_product_by_slug))
        .route(
            "/:id/pack-sizes",
            get(list_pack_sizes).post(set_pack_size_price),
        )
}

pub fn pack_size_routes() -> Router<Arc<AppState>> {
    Router::new().route("/", post(create_pack_size))
}

async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let (products, total) = state
        .services
        .catalog
        .list_products(query.page, query.limit)
        .await?;
    Ok(success_response(serde_json::json!({
        "products": products,
        "total": total,
    })))
}

async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.catalog.get_product(id).await?;
    Ok(success_response(product))
}

async fn get_product_by_slug(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.catalog.get_product_by_slug(&slug).await?;
    Ok(success_response(product))
}

async fn create_product(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateProductInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.catalog.create_product(payload).await?;
    Ok(created_response(product))
}

async fn update_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateProductInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.catalog.update_product(id, payload).await?;
    Ok(success_response(product))
}

async fn list_pack_sizes(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    let options = state.services.catalog.pack_sizes_for_product(id).await?;
    Ok(success_response(options))
}

#[derive(Debug, Deserialize)]
struct SetPackSizePriceRequest {
    pack_size_id: i64,
    price: Decimal,
}

async fn set_pack_size_price(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(payload): Json<SetPackSizePriceRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .catalog
        .set_pack_size_price(id, payload.pack_size_id, payload.price)
        .await?;
    Ok(success_response(serde_json::json!({ "updated": true })))
}

#[derive(Debug, Deserialize)]
struct CreatePackSizeRequest {
    size: String,
}

async fn create_pack_size(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreatePackSizeRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let pack_size = state.services.catalog.create_pack_size(payload.size).await?;
    Ok(created_response(pack_size))
}
