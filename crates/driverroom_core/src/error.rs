//! crates/driverroom_core/src/error.rs
//!
//! The error type returned by the core services (dispatch board, messaging desk).

use crate::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Input rejected before any write was attempted.
    #[error("{0}")]
    Validation(String),

    /// The acting identity could not be resolved.
    #[error("No signed-in operator")]
    MissingOperator,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Port(#[from] PortError),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ServiceError::Forbidden(message.into())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
