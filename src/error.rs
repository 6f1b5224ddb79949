//! Error types for the Places Monitor.
//!
//! All errors are strongly typed using thiserror so callers can match on
//! specific conditions. Capacity limits are deliberately absent: the region
//! cap is enforced by reconciliation and never surfaces as an error.

use thiserror::Error;

use crate::policy::AuthorizationLevel;
use crate::storage::StorageError;

/// Top-level error type for the Places Monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Event queue is empty")]
    QueueEmpty,

    #[error("Precondition unmet: {reason}")]
    PreconditionUnmet {
        reason: String,
    },

    #[error("Authorization denied for requested level {requested}")]
    AuthorizationDenied {
        requested: AuthorizationLevel,
    },

    #[error("External service '{service}' failed: {message}")]
    ExternalService {
        service: String,
        message: String,
    },

    #[error("Persistence error: {0}")]
    Persistence(#[from] StorageError),

    #[error("Invalid configuration field '{field}': {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },

    #[error("Invalid event: {reason}")]
    InvalidEvent {
        reason: String,
    },

    #[error("Operation timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },

    #[error("Channel disconnected: {path}")]
    Disconnected {
        path: String,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl MonitorError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates a precondition error.
    #[must_use]
    pub fn precondition(reason: impl Into<String>) -> Self {
        Self::PreconditionUnmet {
            reason: reason.into(),
        }
    }

    /// Creates an invalid-event error.
    #[must_use]
    pub fn invalid_event(reason: impl Into<String>) -> Self {
        Self::InvalidEvent {
            reason: reason.into(),
        }
    }

    /// Returns true if this is a persistence error.
    #[must_use]
    pub const fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }

    /// Returns true if the event that produced this error should be processed again.
    ///
    /// Unmet preconditions wait for the satisfying event; persistence failures
    /// leave the transition uncommitted. Everything else is terminal.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::PreconditionUnmet { .. } | Self::Persistence(_))
    }
}

/// Result type alias for Places Monitor operations.
pub type MonitorResult<T> = Result<T, MonitorError>;
