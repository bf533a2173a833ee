mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use common::TestApp;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::Arc;
use storefront_api::services::AddItemInput;
use tower::ServiceExt;

fn router(app: &TestApp) -> Router {
    Router::new()
        .nest("/api/v1", storefront_api::api_v1_routes())
        .with_state(Arc::new(app.state.clone()))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_endpoint_responds() {
    let app = TestApp::new().await;
    let response = router(&app)
        .oneshot(
            Request::builder()
                .uri("/api/v1/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn cart_requires_the_identity_header() {
    let app = TestApp::new().await;
    let response = router(&app)
        .oneshot(
            Request::builder()
                .uri("/api/v1/cart")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cart_round_trip_over_http() {
    let app = TestApp::new().await;
    let customer = app.seed_customer(7, None).await;
    let product = app.seed_product("Jaggery Cubes", dec!(150.00), Some(20), 10).await;

    let add = Request::builder()
        .method("POST")
        .uri("/api/v1/cart/items")
        .header("content-type", "application/json")
        .header("x-customer-id", customer.to_string())
        .body(Body::from(
            json!({ "product_id": product.id, "quantity": 2 }).to_string(),
        ))
        .unwrap();
    let response = router(&app).oneshot(add).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let get = Request::builder()
        .uri("/api/v1/cart")
        .header("x-customer-id", customer.to_string())
        .body(Body::empty())
        .unwrap();
    let response = router(&app).oneshot(get).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["lines"].as_array().unwrap().len(), 1);
    let total: rust_decimal::Decimal = body["data"]["total"]
        .as_str()
        .expect("decimal serializes as a string")
        .parse()
        .unwrap();
    assert_eq!(total, dec!(240.00));
}

#[tokio::test]
async fn unknown_product_maps_to_404() {
    let app = TestApp::new().await;
    let response = router(&app)
        .oneshot(
            Request::builder()
                .uri("/api/v1/products/9999")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Not Found");
}

#[tokio::test]
async fn over_stock_quantity_maps_to_422() {
    let app = TestApp::new().await;
    let customer = app.seed_customer(7, None).await;
    let product = app.seed_product("Cane Syrup", dec!(180.00), None, 1).await;

    let item = app
        .services()
        .cart
        .add_item(
            customer,
            AddItemInput {
                product_id: product.id,
                packsize: None,
                quantity: 1,
            },
        )
        .await
        .unwrap();

    let request = Request::builder()
        .method("PUT")
        .uri(format!("/api/v1/cart/items/{}", item.id))
        .header("content-type", "application/json")
        .header("x-customer-id", customer.to_string())
        .body(Body::from(json!({ "quantity": 5 }).to_string()))
        .unwrap();
    let response = router(&app).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn profile_update_validates_the_phone() {
    let app = TestApp::new().await;
    let customer = app.seed_customer(7, None).await;

    let request = Request::builder()
        .method("PUT")
        .uri("/api/v1/profile")
        .header("content-type", "application/json")
        .header("x-customer-id", customer.to_string())
        .body(Body::from(json!({ "phone_number": "98-25x" }).to_string()))
        .unwrap();
    let response = router(&app).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method("PUT")
        .uri("/api/v1/profile")
        .header("content-type", "application/json")
        .header("x-customer-id", customer.to_string())
        .body(Body::from(
            json!({ "phone_number": "+919825550144" }).to_string(),
        ))
        .unwrap();
    let response = router(&app).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn reviews_post_and_list() {
    let app = TestApp::new().await;
    let customer = app.seed_customer(7, None).await;
    let product = app.seed_product("Jaggery Cubes", dec!(150.00), None, 10).await;

    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/v1/products/{}/reviews", product.id))
        .header("content-type", "application/json")
        .header("x-customer-id", customer.to_string())
        .body(Body::from(
            json!({ "rating": 5, "review": "Melts perfectly in chai." }).to_string(),
        ))
        .unwrap();
    let response = router(&app).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = router(&app)
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/products/{}/reviews", product.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["rating"], 5);
}
