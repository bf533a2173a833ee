use crate::{
    errors::ServiceError,
    handlers::common::{customer_identity, success_response},
    services::customers::{IdentityProfile, UpdateProfileInput},
    AppState,
};
use axum::{
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_profile).put(update_profile))
        .route("/sync", post(sync_profile))
}

async fn get_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServiceError> {
    let customer_id = customer_identity(&headers)?;
    let profile = state.services.customers.get_profile(customer_id).await?;
    Ok(success_response(profile))
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<UpdateProfileInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let customer_id = customer_identity(&headers)?;
    let profile = state
        .services
        .customers
        .update_profile(customer_id, payload)
        .await?;
    Ok(success_response(profile))
}

/// Called by the identity layer whenever it refreshes a customer; the body
/// is the identity it vouches for.
async fn sync_profile(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<IdentityProfile>,
) -> Result<impl IntoResponse, ServiceError> {
    let profile = state.services.customers.upsert_profile(payload).await?;
    Ok(success_response(profile))
}
