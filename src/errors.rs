use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error body returned by every handler on failure.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Conflict")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Remaining available quantity, present on insufficient-stock errors so
    /// callers can render an accurate "only N left" message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<i32>,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Insufficient stock: {available} available")]
    InsufficientStock { available: i32 },

    #[error("Concurrent update conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServiceError {
    /// Helper for mapping `sea_orm::DbErr` in closures without a turbofish.
    pub fn db_error(err: sea_orm::DbErr) -> Self {
        ServiceError::DatabaseError(err)
    }

    /// Expected business outcomes that must not be logged as errors.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            ServiceError::InsufficientStock { .. }
                | ServiceError::InvalidQuantity(_)
                | ServiceError::ValidationError(_)
        )
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::InvalidQuantity(_) => StatusCode::BAD_REQUEST,
            ServiceError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::InsufficientStock { .. } => StatusCode::CONFLICT,
            ServiceError::ConcurrencyConflict(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::DatabaseError(_)
            | ServiceError::EventError(_)
            | ServiceError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if !self.is_expected() && status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let available = match &self {
            ServiceError::InsufficientStock { available } => Some(*available),
            _ => None,
        };

        // Retry-exhausted conflicts and storage failures surface as a generic
        // "try again" so transient internals are not leaked to shoppers.
        let message = match &self {
            ServiceError::ConcurrencyConflict(_) => {
                "The item is being updated by another request, please try again".to_string()
            }
            ServiceError::DatabaseError(_) | ServiceError::InternalError(_) => {
                "An internal error occurred, please try again".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            error: status
                .canonical_reason()
                .unwrap_or("Unknown")
                .to_string(),
            message,
            available,
            timestamp: Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_maps_to_conflict_with_available() {
        let err = ServiceError::InsufficientStock { available: 4 };
        assert!(err.is_expected());
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "Insufficient stock: 4 available");
    }

    #[test]
    fn conflict_and_db_errors_are_retryable_server_side() {
        assert_eq!(
            ServiceError::ConcurrencyConflict("reserve".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert!(!ServiceError::ConcurrencyConflict("reserve".into()).is_expected());
    }
}
