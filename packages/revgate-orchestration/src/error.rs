use std::sync::Arc;

use revgate_storage::{ErrorKind, StoreError};
use thiserror::Error;

use crate::config::ConfigError;
use crate::provision::ProvisionFailure;

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error(
        "Index provisioning failed for epoch {}: {} of {} index(es) could not be installed",
        .0.epoch,
        .0.errors.len(),
        .0.total
    )]
    Provisioning(Arc<ProvisionFailure>),

    #[error("Candidate store is unreachable: {0}")]
    Unreachable(StoreError),

    #[error("Write to '{id}' still conflicting after {attempts} retries")]
    RetriesExhausted { id: String, attempts: u32 },

    #[error("Readiness gate for epoch {0} closed before resolving")]
    GateClosed(u64),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SessionError {
    /// Underlying store error kind, if this wraps one
    pub fn store_kind(&self) -> Option<ErrorKind> {
        match self {
            SessionError::Store(err) | SessionError::Unreachable(err) => Some(err.kind),
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            SessionError::Store(err) => match err.kind {
                ErrorKind::Conflict | ErrorKind::Unavailable | ErrorKind::IO => {
                    ErrorCategory::Transient
                }
                ErrorKind::Database => ErrorCategory::Infrastructure,
                ErrorKind::NotFound
                | ErrorKind::Unauthorized
                | ErrorKind::Serialization
                | ErrorKind::Config => ErrorCategory::Permanent,
            },
            SessionError::Unreachable(_) | SessionError::RetriesExhausted { .. } => {
                ErrorCategory::Transient
            }
            SessionError::Provisioning(_) | SessionError::GateClosed(_) => {
                ErrorCategory::Infrastructure
            }
            SessionError::Config(_) => ErrorCategory::Permanent,
        }
    }
}

/// Error category for callers deciding whether to try again
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorCategory {
    /// Transient error - worth retrying later (e.g., store offline, contention)
    Transient,
    /// Permanent error - don't retry (e.g., auth, bad input)
    Permanent,
    /// Infrastructure error - the handle or index set needs fixing
    Infrastructure,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Transient => "transient",
            ErrorCategory::Permanent => "permanent",
            ErrorCategory::Infrastructure => "infrastructure",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
