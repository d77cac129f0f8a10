//! Error type shared by every fleet-core operation.

use thiserror::Error;

/// Failure raised by the allocator, ingest and lifecycle operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FleetError {
    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    ResourceUnavailable(String),

    #[error("{0}")]
    CapacityExceeded(String),

    #[error("cannot move {entity} from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl FleetError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn transition(entity: &'static str, from: impl ToString, to: impl ToString) -> Self {
        Self::InvalidTransition {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Machine-readable error kind, stable across releases.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::NotFound { .. } => "not_found",
            Self::InvalidState(_) => "invalid_state",
            Self::ResourceUnavailable(_) => "resource_unavailable",
            Self::CapacityExceeded(_) => "capacity_exceeded",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Field name for validation failures.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

pub type FleetResult<T> = Result<T, FleetError>;
