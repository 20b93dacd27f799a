//! Error handling for the Raw Milk Tracking Platform
//!
//! Domain rule violations carry their structured payload through to the JSON
//! response so clients can render precise messages.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::DomainError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Domain rule violations
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Request shape errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let (field, message) = errors
            .field_errors()
            .into_iter()
            .next()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| "is invalid".to_string());
                (field.to_string(), message)
            })
            .unwrap_or_else(|| ("request".to_string(), errors.to_string()));
        AppError::Validation { field, message }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// HTTP status for a domain rule violation
pub fn domain_status(error: &DomainError) -> StatusCode {
    match error {
        DomainError::ConfigMissing { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        DomainError::ExclusivitySourceConflict { .. } | DomainError::Validation { .. } => {
            StatusCode::BAD_REQUEST
        }
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::AlreadyAssigned { .. }
        | DomainError::DuplicateOpenTransfer { .. }
        | DomainError::ContainerRetired { .. }
        | DomainError::VerdictAlreadyFinal { .. }
        | DomainError::LotAlreadyRejected { .. }
        | DomainError::DuplicateCycle { .. } => StatusCode::CONFLICT,
        DomainError::CapacityExceeded { .. }
        | DomainError::SiloCapacityExceeded { .. }
        | DomainError::SiloOutsideDestination { .. }
        | DomainError::NonPositiveVolume { .. }
        | DomainError::InvalidStatusTransition { .. }
        | DomainError::HygieneCheckFailed { .. }
        | DomainError::NothingToBill { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

impl AppError {
    fn status_and_detail(&self) -> (StatusCode, ErrorDetail) {
        match self {
            AppError::Domain(err) => (
                domain_status(err),
                ErrorDetail {
                    code: err.code().to_string(),
                    message: err.to_string(),
                    field: match err {
                        DomainError::Validation { field, .. } => Some(field.clone()),
                        _ => None,
                    },
                    details: serde_json::to_value(err).ok(),
                },
            ),
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message: message.clone(),
                    field: Some(field.clone()),
                    details: None,
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail {
                    code: "NOT_FOUND".to_string(),
                    message: format!("{} not found", resource),
                    field: None,
                    details: None,
                },
            ),
            AppError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "CONFIGURATION_ERROR".to_string(),
                    message: format!("Configuration error: {}", msg),
                    field: None,
                    details: None,
                },
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "DATABASE_ERROR".to_string(),
                    message: "A database error occurred".to_string(),
                    field: None,
                    details: None,
                },
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message: "An internal server error occurred".to_string(),
                    field: None,
                    details: None,
                },
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = self.status_and_detail();

        if status.is_server_error() {
            tracing::error!(code = %error_detail.code, "Error: {:?}", self);
        } else {
            tracing::warn!(code = %error_detail.code, "Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    #[test]
    fn capacity_exceeded_is_unprocessable_with_details() {
        let container_id = Uuid::new_v4();
        let err = AppError::from(DomainError::CapacityExceeded {
            container_id,
            capacity: Decimal::from(1000),
            current: Decimal::from(800),
            attempted: Decimal::from(250),
        });
        let (status, detail) = err.status_and_detail();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(detail.code, "CAPACITY_EXCEEDED");

        let details = detail.details.unwrap();
        assert_eq!(details["error"], "capacity_exceeded");
        assert_eq!(details["container_id"], container_id.to_string());
        assert_eq!(details["attempted"], "250");
    }

    #[test]
    fn hygiene_details_keep_container_kind() {
        let container_id = Uuid::new_v4();
        let err = AppError::from(DomainError::HygieneCheckFailed {
            kind: shared::ContainerKind::BulkCooler,
            container_id,
            detail: "never sanitized".to_string(),
            overridable: false,
        });
        let (status, detail) = err.status_and_detail();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let details = detail.details.unwrap();
        assert_eq!(details["error"], "hygiene_check_failed");
        assert_eq!(details["kind"], "bulk_cooler");
        assert_eq!(details["overridable"], false);
    }

    #[test]
    fn conflict_kinds_map_to_409() {
        let id = Uuid::new_v4();
        for err in [
            DomainError::AlreadyAssigned {
                lot_id: id,
                container_id: id,
            },
            DomainError::DuplicateOpenTransfer {
                container_id: id,
                existing_transfer_id: None,
            },
            DomainError::LotAlreadyRejected { lot_id: id },
        ] {
            assert_eq!(domain_status(&err), StatusCode::CONFLICT);
        }
    }

    #[test]
    fn missing_config_is_server_error() {
        let err = DomainError::ConfigMissing {
            route_id: None,
            supplier_id: Uuid::new_v4(),
        };
        assert_eq!(domain_status(&err), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn domain_validation_keeps_field() {
        let err = AppError::from(DomainError::validation("capacity_liters", "must be greater than 0"));
        let (status, detail) = err.status_and_detail();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(detail.field.as_deref(), Some("capacity_liters"));
    }

    #[test]
    fn database_errors_hide_internals() {
        let err = AppError::from(sqlx::Error::RowNotFound);
        let (status, detail) = err.status_and_detail();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(detail.message, "A database error occurred");
    }
}
