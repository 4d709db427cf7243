//! Validation rules shared across request payloads.

use validator::ValidationError;

use crate::types::{BookmarkId, SessionId};

/// Bookmark ids: non-blank, at most 255 characters, no control characters.
pub fn validate_identifier(value: &str) -> Result<(), ValidationError> {
    BookmarkId::parse(value)
        .map(|_| ())
        .map_err(|_| ValidationError::new("identifier_invalid"))
}

/// Session ids must be UUIDs.
pub fn validate_session_id(value: &str) -> Result<(), ValidationError> {
    SessionId::parse(value)
        .map(|_| ())
        .map_err(|_| ValidationError::new("session_id_invalid"))
}
