//! Domain errors raised by the time tracking services.

use crate::repositories::session_store::StoreError;
use crate::types::{BookmarkId, IdError, UserId};

#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    /// Malformed or missing identifiers or ranges. Never retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The session or bookmark does not exist or is not owned by the caller.
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("a session is already active for bookmark {bookmark_id}")]
    AlreadyActive { bookmark_id: BookmarkId },
    /// The store timed out or failed transiently; callers may retry.
    #[error("session store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("{count} active sessions found for user {user_id} and bookmark {bookmark_id}")]
    Inconsistent {
        user_id: UserId,
        bookmark_id: BookmarkId,
        count: usize,
    },
    #[error("authentication failed")]
    AuthenticationFailed,
}

impl TrackingError {
    /// Stable code used in logs and response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            TrackingError::InvalidInput(_) => "INVALID_INPUT",
            TrackingError::NotFound(_) => "NOT_FOUND",
            TrackingError::AlreadyActive { .. } => "ALREADY_ACTIVE",
            TrackingError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            TrackingError::Inconsistent { .. } => "INCONSISTENT",
            TrackingError::AuthenticationFailed => "AUTHENTICATION_FAILED",
        }
    }
}

impl From<IdError> for TrackingError {
    fn from(err: IdError) -> Self {
        TrackingError::InvalidInput(err.to_string())
    }
}

impl From<StoreError> for TrackingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::BookmarkNotVisible => TrackingError::NotFound("Bookmark"),
            StoreError::ActiveSessionExists { bookmark_id, .. } => {
                TrackingError::AlreadyActive { bookmark_id }
            }
            StoreError::Timeout { operation, .. } => {
                TrackingError::StoreUnavailable(format!("{} timed out", operation))
            }
            StoreError::Backend(message) => TrackingError::StoreUnavailable(message),
        }
    }
}
