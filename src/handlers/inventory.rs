use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::entities::stock_movement::MovementType;
use crate::errors::ServiceError;
use crate::services::inventory::RestockLine;
use crate::{ApiResponse, AppState};

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct VariantQuery {
    pub variant_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct AvailabilityQuery {
    pub variant_id: Option<Uuid>,
    pub quantity: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct MovementsQuery {
    pub variant_id: Option<Uuid>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateItemRequest {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    #[validate(length(min = 1, message = "SKU is required"))]
    pub sku: String,
    #[validate(range(min = 0))]
    pub low_stock_threshold: Option<i32>,
    pub track_quantity: Option<bool>,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RestockRequest {
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i32,
    pub variant_id: Option<Uuid>,
    pub reason: Option<String>,
    pub reference: Option<String>,
    pub actor: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BulkRestockRequest {
    #[validate(length(min = 1, message = "At least one line is required"))]
    pub lines: Vec<RestockLine>,
    pub reason: Option<String>,
    pub actor: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MovementView {
    pub id: Uuid,
    pub inventory_item_id: Uuid,
    pub movement_type: MovementType,
    pub quantity: i32,
    pub reason: String,
    pub reference: Option<String>,
    pub actor: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub fn inventory_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_item))
        .route("/bulk-restock", post(bulk_restock))
        .route("/:product_id", get(get_status))
        .route("/:product_id/availability", get(check_availability))
        .route("/:product_id/restock", post(restock))
        .route("/:product_id/movements", get(list_movements))
}

/// Provision a tracked (or untracked) inventory record for a product.
#[utoipa::path(
    post,
    path = "/api/v1/inventory",
    request_body = CreateItemRequest,
    responses(
        (status = 201, description = "Inventory item created", body = crate::services::inventory::InventoryStatus),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn create_item(
    State(state): State<AppState>,
    Json(payload): Json<CreateItemRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(format!("Invalid request: {}", e)))?;

    let status = state
        .inventory
        .create_item(
            payload.product_id,
            payload.variant_id,
            payload.sku,
            payload.low_stock_threshold.unwrap_or(0),
            payload.track_quantity.unwrap_or(true),
            payload.location,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(status))))
}

/// Current quantity, reservations and availability for a product.
#[utoipa::path(
    get,
    path = "/api/v1/inventory/{product_id}",
    params(
        ("product_id" = Uuid, Path, description = "Product id"),
        VariantQuery
    ),
    responses(
        (status = 200, description = "Inventory status", body = crate::services::inventory::InventoryStatus),
        (status = 404, description = "No inventory record", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn get_status(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Query(query): Query<VariantQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let status = state.inventory.get_status(product_id, query.variant_id).await?;
    Ok(Json(ApiResponse::success(status)))
}

/// Whether the requested quantity can currently be fulfilled.
#[utoipa::path(
    get,
    path = "/api/v1/inventory/{product_id}/availability",
    params(
        ("product_id" = Uuid, Path, description = "Product id"),
        AvailabilityQuery
    ),
    responses(
        (status = 200, description = "Availability result"),
        (status = 400, description = "Invalid quantity", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn check_availability(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let quantity = query.quantity.unwrap_or(1);
    if quantity <= 0 {
        return Err(ServiceError::InvalidQuantity(format!(
            "quantity must be positive, got {}",
            quantity
        )));
    }

    let in_stock = state
        .inventory
        .is_in_stock(product_id, query.variant_id, quantity)
        .await?;

    Ok(Json(ApiResponse::success(json!({
        "product_id": product_id,
        "variant_id": query.variant_id,
        "quantity": quantity,
        "in_stock": in_stock
    }))))
}

/// Add received stock and write an IN movement.
#[utoipa::path(
    post,
    path = "/api/v1/inventory/{product_id}/restock",
    params(("product_id" = Uuid, Path, description = "Product id")),
    request_body = RestockRequest,
    responses(
        (status = 200, description = "Stock added", body = crate::services::inventory::InventoryStatus),
        (status = 400, description = "Invalid quantity", body = crate::errors::ErrorResponse),
        (status = 404, description = "No inventory record", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn restock(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<RestockRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(format!("Invalid request: {}", e)))?;

    let status = state
        .inventory
        .add_stock(
            product_id,
            payload.quantity,
            payload.variant_id,
            payload.reason.as_deref().unwrap_or("Restock"),
            payload.reference.as_deref(),
            payload.actor.as_deref(),
        )
        .await?;

    Ok(Json(ApiResponse::success(status)))
}

/// Batch restock across products, e.g. a received delivery manifest. Lines
/// apply independently; failures come back per line in the report.
#[utoipa::path(
    post,
    path = "/api/v1/inventory/bulk-restock",
    request_body = BulkRestockRequest,
    responses(
        (status = 200, description = "Batch processed", body = crate::services::inventory::BulkRestockReport),
        (status = 422, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn bulk_restock(
    State(state): State<AppState>,
    Json(payload): Json<BulkRestockRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(format!("Invalid request: {}", e)))?;

    let report = state
        .inventory
        .bulk_add_stock(
            &payload.lines,
            payload.reason.as_deref().unwrap_or("Bulk restock"),
            payload.actor.as_deref(),
        )
        .await?;

    Ok(Json(ApiResponse::success(report)))
}

/// Movement audit trail for a product, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/inventory/{product_id}/movements",
    params(
        ("product_id" = Uuid, Path, description = "Product id"),
        MovementsQuery
    ),
    responses(
        (status = 200, description = "Movement list", body = [MovementView]),
        (status = 404, description = "No inventory record", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn list_movements(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Query(query): Query<MovementsQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let limit = query.limit.unwrap_or(50).min(200);
    let offset = query.offset.unwrap_or(0);

    let movements = state
        .inventory
        .movements()
        .list_for_product(product_id, query.variant_id, limit, offset)
        .await?;

    let views: Vec<MovementView> = movements
        .into_iter()
        .map(|m| MovementView {
            id: m.id,
            inventory_item_id: m.inventory_item_id,
            movement_type: m.movement_type,
            quantity: m.quantity,
            reason: m.reason,
            reference: m.reference,
            actor: m.actor,
            created_at: m.created_at,
        })
        .collect();

    Ok(Json(ApiResponse::success(json!({
        "movements": views,
        "limit": limit,
        "offset": offset
    }))))
}
