//! Stockledger API Library
//!
//! Per-SKU stock tracking with reservations, a movement audit trail,
//! low-stock alerting and order lifecycle coordination.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod services;

use axum::{http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub inventory: services::inventory::InventoryService,
    pub orders: services::orders::OrderService,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        let inventory = services::inventory::InventoryService::new(
            db.clone(),
            event_sender.clone(),
            config.reservation_ttl_minutes,
            config.conflict_retries,
        );
        let orders = services::orders::OrderService::new(
            db.clone(),
            inventory.clone(),
            event_sender.clone(),
        );
        Self {
            db,
            config,
            event_sender,
            inventory,
            orders,
        }
    }
}

/// Envelope for every successful handler response. Failures go through
/// `errors::ErrorResponse` instead.
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::inventory::create_item,
        handlers::inventory::get_status,
        handlers::inventory::check_availability,
        handlers::inventory::restock,
        handlers::inventory::bulk_restock,
        handlers::inventory::list_movements,
        handlers::orders::create_order,
        handlers::orders::list_orders,
        handlers::orders::get_order,
        handlers::orders::confirm_payment,
        handlers::orders::cancel_order,
        handlers::orders::mark_shipped,
        handlers::alerts::list_low_stock,
    ),
    components(schemas(
        errors::ErrorResponse,
        services::inventory::InventoryStatus,
        services::inventory::RestockLine,
        services::inventory::BulkRestockError,
        services::inventory::BulkRestockReport,
        services::orders::CreateOrderRequest,
        services::orders::OrderLineRequest,
        services::orders::OrderResponse,
        services::orders::OrderListResponse,
        handlers::inventory::CreateItemRequest,
        handlers::inventory::RestockRequest,
        handlers::inventory::BulkRestockRequest,
        handlers::inventory::MovementView,
        handlers::orders::CancelOrderRequest,
        handlers::alerts::AlertView,
        entities::stock_movement::MovementType,
        entities::order::OrderStatus,
        entities::low_stock_alert::AlertStatus,
    )),
    tags(
        (name = "inventory", description = "Stock levels, restocks and movements"),
        (name = "orders", description = "Order lifecycle and stock coordination"),
        (name = "alerts", description = "Low-stock alerting")
    ),
    info(
        title = "Stockledger API",
        description = "Inventory reservation and fulfillment ledger"
    )
)]
pub struct ApiDoc;

pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .nest("/inventory", handlers::inventory::inventory_router())
        .nest("/orders", handlers::orders::orders_router())
        .nest("/alerts", handlers::alerts::alerts_router())
}

/// Full application router: health and metrics at the root, the versioned
/// API under /api/v1, Swagger UI at /docs.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "stockledger-api up" }))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .nest("/api/v1", api_v1_routes())
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn metrics() -> Result<String, StatusCode> {
    let encoder = prometheus::TextEncoder::new();
    encoder
        .encode_to_string(&prometheus::gather())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
