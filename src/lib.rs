//! Storefront API Library
//!
//! Catalog browsing, per-customer carts, checkout, the payment lifecycle and
//! WhatsApp order notifications for a small packaged-goods storefront.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod services;

use axum::{routing::get, Json, Router};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<config::AppConfig>,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

// Common query parameters for list endpoints
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_page() -> u64 {
    1
}
fn default_limit() -> u64 {
    20
}

// Common response envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
        }
    }
}

/// The full v1 API surface.
pub fn api_v1_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/products", handlers::catalog::routes())
        .nest("/products", handlers::reviews::routes())
        .nest("/pack-sizes", handlers::catalog::pack_size_routes())
        .nest("/cart", handlers::cart::routes())
        .nest("/checkout", handlers::checkout::routes())
        .nest("/orders", handlers::checkout::order_routes())
        .nest("/payments", handlers::payments::routes())
        .nest("/profile", handlers::customers::routes())
        .route("/health", get(health))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
