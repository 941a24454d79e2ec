//! Error types for the collaborative-editing core.

use thiserror::Error;

/// Result type used throughout the collab core.
pub type Result<T> = std::result::Result<T, CollabError>;

/// Errors raised by the operation/transform/session/coordinator pipeline.
///
/// This type has no transport dependency; `crates/server` wraps it in a thin `IntoResponse` enum
/// that maps each variant to an HTTP status.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CollabError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("page not found: {0}")]
    NotFound(String),

    #[error("bad operation: {0}")]
    BadOperation(String),

    #[error("operation conflicts with current content: {0}")]
    Conflict(String),

    #[error("client state is stale, resync required")]
    Stale,

    #[error("update exceeds maximum size ({0} bytes)")]
    Oversize(usize),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("internal invariant violated: {0}")]
    Fatal(String),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl CollabError {
    /// Whether this error should be logged but never surfaced to the originating client.
    #[must_use]
    pub fn is_silent(&self) -> bool {
        matches!(self, CollabError::Transient(_))
    }

    /// Whether the client should be told to perform a full resync.
    #[must_use]
    pub fn requires_resync(&self) -> bool {
        matches!(self, CollabError::Stale | CollabError::Conflict(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_is_silent() {
        assert!(CollabError::Transient("broadcast lagged".into()).is_silent());
        assert!(!CollabError::BadOperation("bad".into()).is_silent());
    }

    #[test]
    fn conflict_and_stale_require_resync() {
        assert!(CollabError::Stale.requires_resync());
        assert!(CollabError::Conflict("x".into()).requires_resync());
        assert!(!CollabError::NotFound("p".into()).requires_resync());
    }
}
