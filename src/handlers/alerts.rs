use axum::{
    extract::{Json, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::entities::low_stock_alert::AlertStatus;
use crate::errors::ServiceError;
use crate::{ApiResponse, AppState};

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct AlertListQuery {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AlertView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub current_stock: i32,
    pub threshold: i32,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

pub fn alerts_router() -> Router<AppState> {
    Router::new().route("/low-stock", get(list_low_stock))
}

/// Active low-stock alerts, most recent first.
#[utoipa::path(
    get,
    path = "/api/v1/alerts/low-stock",
    params(AlertListQuery),
    responses(
        (status = 200, description = "Active low-stock alerts", body = [AlertView])
    ),
    tag = "alerts"
)]
pub async fn list_low_stock(
    State(state): State<AppState>,
    Query(query): Query<AlertListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let limit = query.limit.unwrap_or(50).min(200);
    let offset = query.offset.unwrap_or(0);

    let alerts = state
        .inventory
        .low_stock()
        .active_alerts(limit, offset)
        .await?;

    let views: Vec<AlertView> = alerts
        .into_iter()
        .map(|a| AlertView {
            id: a.id,
            product_id: a.product_id,
            variant_id: a.variant_id,
            current_stock: a.current_stock,
            threshold: a.threshold,
            status: a.status,
            created_at: a.created_at,
            updated_at: a.updated_at,
        })
        .collect();

    Ok(Json(ApiResponse::success(json!({
        "alerts": views,
        "limit": limit,
        "offset": offset
    }))))
}
