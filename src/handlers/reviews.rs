use crate::{
    errors::ServiceError,
    handlers::common::{created_response, customer_identity, success_response},
    services::reviews::SubmitReviewInput,
    AppState,
};
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/:id/reviews", get(list_reviews).post(submit_review))
}

async fn submit_review(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(product_id): Path<i64>,
    Json(payload): Json<SubmitReviewInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let customer_id = customer_identity(&headers)?;
    let review = state
        .services
        .reviews
        .submit_review(customer_id, product_id, payload)
        .await?;
    Ok(created_response(review))
}

async fn list_reviews(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    let reviews = state.services.reviews.reviews_for_product(product_id).await?;
    Ok(success_response(reviews))
}
