//! services/api/src/web/reply.rs
//!
//! Maps core and port failures to the `(StatusCode, String)` rejections the
//! handlers return.

use axum::http::StatusCode;
use driverroom_core::{PortError, ServiceError};
use tracing::error;

pub type Rejection = (StatusCode, String);

pub type HandlerResult<T> = Result<T, Rejection>;

/// Rejection for a failed core service call. Server-side failures are logged
/// and replaced with a generic message.
pub fn service_failure(action: &str, e: ServiceError) -> Rejection {
    match e {
        ServiceError::Validation(message) => (StatusCode::BAD_REQUEST, message),
        ServiceError::MissingOperator => {
            (StatusCode::UNAUTHORIZED, "No signed-in operator".to_string())
        }
        ServiceError::Forbidden(message) => (StatusCode::FORBIDDEN, message),
        ServiceError::Port(e) => port_failure(action, e),
    }
}

pub fn port_failure(action: &str, e: PortError) -> Rejection {
    match e {
        PortError::NotFound(what) => (StatusCode::NOT_FOUND, format!("Not found: {}", what)),
        PortError::Conflict(what) => (StatusCode::CONFLICT, what),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        PortError::Unexpected(detail) => {
            error!("Failed to {}: {}", action, detail);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to {}", action),
            )
        }
    }
}

pub fn bad_request(message: impl Into<String>) -> Rejection {
    (StatusCode::BAD_REQUEST, message.into())
}
