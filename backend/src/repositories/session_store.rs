//! Session store contract.
//!
//! The store is the only source of truth for tracking sessions. Implementations
//! must reject a second active session for the same (user, bookmark) pair with
//! [`StoreError::ActiveSessionExists`] so the guarantee holds across concurrent
//! callers, not just within one process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;

use crate::models::tracking_session::TrackingSession;
use crate::types::{BookmarkId, SessionId, UserId};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("an active session already exists for user {user_id} and bookmark {bookmark_id}")]
    ActiveSessionExists {
        user_id: UserId,
        bookmark_id: BookmarkId,
    },
    #[error("bookmark is not visible to the user")]
    BookmarkNotVisible,
    #[error("{operation} exceeded {limit:?}")]
    Timeout {
        operation: &'static str,
        limit: Duration,
    },
    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Fields written when a session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionUpdate {
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: i64,
}

/// Optional narrowing for ended-session queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndedSessionFilter {
    pub bookmark_id: Option<BookmarkId>,
    /// Inclusive lower bound on `started_at`.
    pub started_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `started_at`.
    pub started_before: Option<DateTime<Utc>>,
}

impl EndedSessionFilter {
    pub fn for_bookmark(bookmark_id: BookmarkId) -> Self {
        Self {
            bookmark_id: Some(bookmark_id),
            ..Self::default()
        }
    }

    pub fn started_between(from: DateTime<Utc>, before: DateTime<Utc>) -> Self {
        Self {
            bookmark_id: None,
            started_from: Some(from),
            started_before: Some(before),
        }
    }

    /// Applies the filter to an in-memory session.
    pub fn matches(&self, session: &TrackingSession) -> bool {
        if session.is_active() {
            return false;
        }
        if let Some(bookmark_id) = &self.bookmark_id {
            if &session.bookmark_id != bookmark_id {
                return false;
            }
        }
        if let Some(from) = self.started_from {
            if session.started_at < from {
                return false;
            }
        }
        if let Some(before) = self.started_before {
            if session.started_at >= before {
                return false;
            }
        }
        true
    }
}

/// Access patterns the time tracking services rely on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persists a new active session.
    async fn insert(&self, session: &TrackingSession) -> Result<TrackingSession, StoreError>;

    /// Ends an active session. Returns `None` when the session is unknown or
    /// has already ended.
    async fn update(
        &self,
        id: SessionId,
        update: &SessionUpdate,
    ) -> Result<Option<TrackingSession>, StoreError>;

    async fn find_by_id(&self, id: SessionId) -> Result<Option<TrackingSession>, StoreError>;

    /// Active sessions for the pair, most recently started first.
    async fn find_active(
        &self,
        user_id: &UserId,
        bookmark_id: &BookmarkId,
    ) -> Result<Vec<TrackingSession>, StoreError>;

    /// Active sessions for the user across all bookmarks.
    async fn find_active_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<TrackingSession>, StoreError>;

    async fn find_ended(
        &self,
        user_id: &UserId,
        filter: &EndedSessionFilter,
    ) -> Result<Vec<TrackingSession>, StoreError>;

    /// Most recently started sessions for the pair, active or ended.
    async fn find_recent(
        &self,
        user_id: &UserId,
        bookmark_id: &BookmarkId,
        limit: i64,
    ) -> Result<Vec<TrackingSession>, StoreError>;

    /// Title of a bookmark owned by the user, if the store knows it.
    async fn bookmark_title(
        &self,
        user_id: &UserId,
        bookmark_id: &BookmarkId,
    ) -> Result<Option<String>, StoreError>;
}

/// Runs a store call under a deadline.
pub async fn bounded<T, F>(operation: &'static str, limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation, limit_ms = limit.as_millis() as u64, "Session store call timed out");
            Err(StoreError::Timeout { operation, limit })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tracking_session::{SessionMetadata, SessionType};
    use chrono::TimeZone;

    fn ended_session(bookmark: &str, start_hour: u32) -> TrackingSession {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, start_hour, 0, 0).unwrap();
        let mut session = TrackingSession::new(
            BookmarkId::parse(bookmark).unwrap(),
            UserId::parse("user").unwrap(),
            SessionType::View,
            SessionMetadata::new(),
            start,
        );
        session.end_at(start + chrono::Duration::minutes(5));
        session
    }

    #[test]
    fn filter_excludes_active_sessions() {
        let mut session = ended_session("bm", 9);
        session.ended_at = None;
        session.duration_seconds = None;
        assert!(!EndedSessionFilter::default().matches(&session));
    }

    #[test]
    fn filter_applies_bookmark_and_range() {
        let session = ended_session("bm", 9);
        let other = BookmarkId::parse("other").unwrap();
        assert!(EndedSessionFilter::for_bookmark(session.bookmark_id.clone()).matches(&session));
        assert!(!EndedSessionFilter::for_bookmark(other).matches(&session));

        let from = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let before = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        assert!(EndedSessionFilter::started_between(from, before).matches(&session));
        assert!(!EndedSessionFilter::started_between(before, before).matches(&session));
    }

    #[tokio::test]
    async fn bounded_reports_timeout() {
        let result: Result<(), StoreError> = bounded("slow", Duration::from_millis(5), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;
        assert!(matches!(
            result,
            Err(StoreError::Timeout { operation: "slow", .. })
        ));
    }

    #[test]
    fn mock_session_store_is_send_sync() {
        fn check_send_sync<T: Send + Sync>() {}
        check_send_sync::<MockSessionStore>();
    }
}
