//! Session lifecycle: start, end and look up tracking sessions.
//!
//! The service keeps no session state of its own. Every decision is made
//! against the store, and the store is responsible for rejecting a second
//! active session for the same (user, bookmark) pair.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::TrackingError;
use crate::models::clamp_limit;
use crate::models::tracking_session::{
    duration_between, SessionMetadata, SessionType, TrackingSession,
};
use crate::repositories::session_store::{bounded, SessionStore, SessionUpdate, StoreError};
use crate::types::{BookmarkId, SessionId, UserId};
use crate::utils::{format_duration, Clock};

#[derive(Clone)]
pub struct TimeTrackingService {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    store_timeout: Duration,
}

impl TimeTrackingService {
    pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>, store_timeout: Duration) -> Self {
        Self {
            store,
            clock,
            store_timeout,
        }
    }

    async fn call<T, F>(&self, operation: &'static str, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        bounded(operation, self.store_timeout, call).await
    }

    /// Starts tracking a bookmark.
    ///
    /// If the pair already has an active session it is returned as is and
    /// nothing is written.
    pub async fn start_session(
        &self,
        bookmark_id: &str,
        user_id: &str,
        session_type: SessionType,
        metadata: SessionMetadata,
    ) -> Result<TrackingSession, TrackingError> {
        let bookmark_id = BookmarkId::parse(bookmark_id)?;
        let user_id = UserId::parse(user_id)?;

        if let Some(existing) = self.current_active(&user_id, &bookmark_id).await? {
            tracing::debug!(
                session_id = %existing.id,
                bookmark_id = %bookmark_id,
                "Session already active; returning it"
            );
            return Ok(existing);
        }

        let mut retried = false;
        loop {
            let session = TrackingSession::new(
                bookmark_id.clone(),
                user_id.clone(),
                session_type,
                metadata.clone(),
                self.clock.now(),
            );

            match self.call("insert", self.store.insert(&session)).await {
                Ok(created) => {
                    tracing::info!(
                        session_id = %created.id,
                        bookmark_id = %created.bookmark_id,
                        user_id = %created.user_id,
                        session_type = %created.session_type,
                        "Tracking session started"
                    );
                    return Ok(created);
                }
                Err(StoreError::ActiveSessionExists { .. }) if !retried => {
                    // A concurrent start won the insert.
                    if let Some(winner) = self.current_active(&user_id, &bookmark_id).await? {
                        return Ok(winner);
                    }
                    tracing::warn!(
                        bookmark_id = %bookmark_id,
                        user_id = %user_id,
                        "Conflicting session ended before it could be read; retrying start"
                    );
                    retried = true;
                }
                Err(StoreError::ActiveSessionExists { .. }) => {
                    return Err(TrackingError::AlreadyActive { bookmark_id });
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Ends a session owned by the caller. Ending an ended session is a no-op.
    pub async fn end_session(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<TrackingSession, TrackingError> {
        let session_id = SessionId::parse(session_id)?;
        let user_id = UserId::parse(user_id)?;

        let session = self
            .call("find_by_id", self.store.find_by_id(session_id))
            .await?
            .filter(|session| session.user_id == user_id)
            .ok_or(TrackingError::NotFound("Session"))?;

        if !session.is_active() {
            tracing::debug!(session_id = %session.id, "Session already ended");
            return Ok(session);
        }

        self.finish(session).await
    }

    /// The active session for the pair, if any.
    pub async fn get_active_session(
        &self,
        bookmark_id: &str,
        user_id: &str,
    ) -> Result<Option<TrackingSession>, TrackingError> {
        let bookmark_id = BookmarkId::parse(bookmark_id)?;
        let user_id = UserId::parse(user_id)?;
        self.current_active(&user_id, &bookmark_id).await
    }

    /// Seconds the session has been running as of now, or its recorded duration.
    pub fn elapsed_seconds(&self, session: &TrackingSession) -> i64 {
        session.elapsed_seconds(self.clock.now())
    }

    pub async fn end_active_sessions_for_bookmark(
        &self,
        bookmark_id: &str,
        user_id: &str,
    ) -> Result<Vec<TrackingSession>, TrackingError> {
        let bookmark_id = BookmarkId::parse(bookmark_id)?;
        let user_id = UserId::parse(user_id)?;

        let active = self
            .call("find_active", self.store.find_active(&user_id, &bookmark_id))
            .await?;
        self.finish_all(active).await
    }

    pub async fn end_all_active_sessions(
        &self,
        user_id: &str,
    ) -> Result<Vec<TrackingSession>, TrackingError> {
        let user_id = UserId::parse(user_id)?;

        let active = self
            .call(
                "find_active_for_user",
                self.store.find_active_for_user(&user_id),
            )
            .await?;
        self.finish_all(active).await
    }

    /// Most recently started sessions for a bookmark, active ones included.
    pub async fn list_bookmark_sessions(
        &self,
        bookmark_id: &str,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<TrackingSession>, TrackingError> {
        let bookmark_id = BookmarkId::parse(bookmark_id)?;
        let user_id = UserId::parse(user_id)?;

        let sessions = self
            .call(
                "find_recent",
                self.store
                    .find_recent(&user_id, &bookmark_id, clamp_limit(limit)),
            )
            .await?;
        Ok(sessions)
    }

    /// Records a visit to the bookmarked URL as an `external-visit` session.
    pub async fn track_external_visit(
        &self,
        bookmark_id: &str,
        user_id: &str,
        mut metadata: SessionMetadata,
        user_agent: Option<&str>,
    ) -> Result<TrackingSession, TrackingError> {
        metadata.insert("external_visit", true);
        metadata.insert("timestamp", self.clock.now().to_rfc3339());
        metadata.insert("user_agent", user_agent.unwrap_or("unknown"));

        self.start_session(bookmark_id, user_id, SessionType::ExternalVisit, metadata)
            .await
    }

    async fn current_active(
        &self,
        user_id: &UserId,
        bookmark_id: &BookmarkId,
    ) -> Result<Option<TrackingSession>, TrackingError> {
        let active = self
            .call("find_active", self.store.find_active(user_id, bookmark_id))
            .await?;

        if active.len() > 1 {
            let err = TrackingError::Inconsistent {
                user_id: user_id.clone(),
                bookmark_id: bookmark_id.clone(),
                count: active.len(),
            };
            tracing::error!(error = %err, kind = err.kind(), "Active session invariant violated");
        }

        Ok(active.into_iter().max_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.id.cmp(&b.id))
        }))
    }

    async fn finish(&self, session: TrackingSession) -> Result<TrackingSession, TrackingError> {
        let ended_at = self.clock.now();
        let update = SessionUpdate {
            ended_at,
            duration_seconds: duration_between(session.started_at, ended_at),
        };

        match self.call("update", self.store.update(session.id, &update)).await? {
            Some(ended) => {
                tracing::info!(
                    session_id = %ended.id,
                    bookmark_id = %ended.bookmark_id,
                    duration = %format_duration(update.duration_seconds),
                    "Tracking session ended"
                );
                Ok(ended)
            }
            None => {
                // Someone else ended it first; report what was stored.
                self.call("find_by_id", self.store.find_by_id(session.id))
                    .await?
                    .ok_or(TrackingError::NotFound("Session"))
            }
        }
    }

    async fn finish_all(
        &self,
        sessions: Vec<TrackingSession>,
    ) -> Result<Vec<TrackingSession>, TrackingError> {
        let mut ended = Vec::with_capacity(sessions.len());
        for session in sessions {
            ended.push(self.finish(session).await?);
        }
        Ok(ended)
    }
}
