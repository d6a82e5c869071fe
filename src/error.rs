//! Error types for the Biblos circulation server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable application error codes exposed to API clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Success = 0,
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NoSuchEntity = 4,
    EntityInactive = 5,
    BadValue = 6,
    ItemNotAvailable = 7,
    LoanLimitReached = 8,
    HoldLimitReached = 9,
    RenewLimitReached = 10,
    RenewBlockedByQueue = 11,
    RenewNotAllowed = 12,
    LoanNotOpen = 13,
    HoldNotActive = 14,
    HoldExpired = 15,
    DuplicateHold = 16,
    BorrowerBlocked = 17,
    DataInconsistent = 18,
    InvalidTransition = 19,
    PolicyNotFound = 20,
}

/// Main application error type
///
/// Every failure surfaced by the engine is one of these kinds; callers
/// pattern-match on the kind, the transport layer maps it to a stable
/// status/code pair.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Policy not found: {0}")]
    PolicyNotFound(String),

    #[error("Inactive: {0}")]
    Inactive(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {message}")]
    Conflict {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid {entity} transition: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Conflict with a stable code and no extra details
    pub fn conflict(code: ErrorCode, message: impl Into<String>) -> Self {
        AppError::Conflict {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Conflict carrying structured details (competing ids, limits, dates)
    pub fn conflict_with(
        code: ErrorCode,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        AppError::Conflict {
            code,
            message: message.into(),
            details: Some(details),
        }
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchEntity, msg, None),
            AppError::PolicyNotFound(msg) => {
                (StatusCode::NOT_FOUND, ErrorCode::PolicyNotFound, msg, None)
            }
            AppError::Inactive(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorCode::EntityInactive,
                msg,
                None,
            ),
            AppError::Forbidden(msg) => {
                (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized, msg, None)
            }
            AppError::Conflict {
                code,
                message,
                details,
            } => (StatusCode::CONFLICT, code, message, details),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg, None),
            AppError::InvalidTransition { entity, from, to } => (
                StatusCode::CONFLICT,
                ErrorCode::InvalidTransition,
                format!("Invalid {} transition", entity),
                Some(serde_json::json!({ "entity": entity, "from": from, "to": to })),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                    None,
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_carries_stable_code() {
        let err = AppError::conflict(ErrorCode::ItemNotAvailable, "item B1 is checked_out");
        match err {
            AppError::Conflict { code, .. } => assert_eq!(code, ErrorCode::ItemNotAvailable),
            _ => panic!("expected conflict"),
        }
    }

    #[test]
    fn invalid_transition_names_both_states() {
        let err = AppError::InvalidTransition {
            entity: "item",
            from: "lost".to_string(),
            to: "checked_out".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("lost"));
        assert!(msg.contains("checked_out"));
    }
}
