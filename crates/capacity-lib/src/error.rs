//! Error types for resource pool accounting

use thiserror::Error;

/// Result type alias for snapshot and collaborator operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors surfaced by reloads and mutations.
///
/// Pure queries over a loaded snapshot never fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// Pool spec or node is absent from the store or from the snapshot
    #[error("not found: {0}")]
    NotFound(String),

    /// An optimistic patch lost a race against a concurrent writer
    #[error("conflict: {0}")]
    Conflict(String),

    /// The cluster could not be reached or returned unreadable data
    #[error("transport error: {0}")]
    Transport(String),

    #[error("validation error: {0}")]
    Validation(String),
}

impl PoolError {
    pub fn not_found(what: impl Into<String>) -> Self {
        PoolError::NotFound(what.into())
    }

    pub fn transport(err: impl std::fmt::Display) -> Self {
        PoolError::Transport(err.to_string())
    }

    /// Conflicts and transport failures may succeed after a reload
    pub fn is_retryable(&self) -> bool {
        matches!(self, PoolError::Conflict(_) | PoolError::Transport(_))
    }
}
