//! Data models shared across the session store and API handlers.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Default number of sessions returned by list endpoints.
pub const DEFAULT_LIST_LIMIT: i64 = 50;
/// Upper bound on sessions returned by list endpoints.
pub const MAX_LIST_LIMIT: i64 = 500;

/// Query parameters for listing a bookmark's sessions.
#[derive(Debug, Clone, Serialize, Deserialize, IntoParams, ToSchema)]
pub struct SessionListQuery {
    pub bookmark_id: String,
    /// Maximum number of records to return (default: 50, max: 500).
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    DEFAULT_LIST_LIMIT
}

impl SessionListQuery {
    /// Returns a clamped limit value (1..=500).
    pub fn limit(&self) -> i64 {
        clamp_limit(self.limit)
    }
}

/// Clamps a caller supplied limit into 1..=500.
pub fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(1, MAX_LIST_LIMIT)
}

pub mod time_stats;
pub mod tracking_session;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_query_clamps_limit() {
        let query: SessionListQuery =
            serde_json::from_str(r#"{"bookmark_id":"bm","limit":10000}"#).unwrap();
        assert_eq!(query.limit(), MAX_LIST_LIMIT);

        let query: SessionListQuery =
            serde_json::from_str(r#"{"bookmark_id":"bm","limit":-3}"#).unwrap();
        assert_eq!(query.limit(), 1);
    }

    #[test]
    fn list_query_defaults_limit() {
        let query: SessionListQuery = serde_json::from_str(r#"{"bookmark_id":"bm"}"#).unwrap();
        assert_eq!(query.limit(), DEFAULT_LIST_LIMIT);
    }
}
