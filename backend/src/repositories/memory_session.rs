//! In-process session store.
//!
//! Used when the service runs without PostgreSQL (`SESSION_STORE=memory`) and by
//! tests. The active-session check and the insert happen under one lock, which
//! gives the same guarantee as the partial unique index in PostgreSQL.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::models::tracking_session::TrackingSession;
use crate::repositories::session_store::{
    EndedSessionFilter, SessionStore, SessionUpdate, StoreError,
};
use crate::types::{BookmarkId, SessionId, UserId};

#[derive(Debug, Default)]
struct MemoryState {
    sessions: HashMap<SessionId, TrackingSession>,
    /// Registered bookmarks and their titles; `None` accepts every bookmark.
    visible_bookmarks: Option<HashMap<(UserId, BookmarkId), Option<String>>>,
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    state: Mutex<MemoryState>,
}

impl MemorySessionStore {
    /// Creates a store that accepts sessions for any bookmark.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that only accepts sessions for registered bookmarks.
    pub fn with_visible_bookmarks<I>(bookmarks: I) -> Self
    where
        I: IntoIterator<Item = (UserId, BookmarkId)>,
    {
        Self::with_registry(bookmarks.into_iter().map(|key| (key, None)))
    }

    /// Like [`Self::with_visible_bookmarks`], with a title for each bookmark.
    pub fn with_titled_bookmarks<I>(bookmarks: I) -> Self
    where
        I: IntoIterator<Item = (UserId, BookmarkId, String)>,
    {
        Self::with_registry(
            bookmarks
                .into_iter()
                .map(|(user_id, bookmark_id, title)| ((user_id, bookmark_id), Some(title))),
        )
    }

    fn with_registry<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = ((UserId, BookmarkId), Option<String>)>,
    {
        Self {
            state: Mutex::new(MemoryState {
                sessions: HashMap::new(),
                visible_bookmarks: Some(entries.into_iter().collect()),
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("memory session store lock poisoned".into()))
    }

    fn newest_first(mut sessions: Vec<TrackingSession>) -> Vec<TrackingSession> {
        sessions.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        sessions
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, session: &TrackingSession) -> Result<TrackingSession, StoreError> {
        let mut state = self.lock()?;

        if let Some(visible) = &state.visible_bookmarks {
            let key = (session.user_id.clone(), session.bookmark_id.clone());
            if !visible.contains_key(&key) {
                return Err(StoreError::BookmarkNotVisible);
            }
        }

        let conflict = state.sessions.values().any(|existing| {
            existing.is_active()
                && existing.user_id == session.user_id
                && existing.bookmark_id == session.bookmark_id
        });
        if conflict {
            return Err(StoreError::ActiveSessionExists {
                user_id: session.user_id.clone(),
                bookmark_id: session.bookmark_id.clone(),
            });
        }

        state.sessions.insert(session.id, session.clone());
        Ok(session.clone())
    }

    async fn update(
        &self,
        id: SessionId,
        update: &SessionUpdate,
    ) -> Result<Option<TrackingSession>, StoreError> {
        let mut state = self.lock()?;
        match state.sessions.get_mut(&id) {
            Some(session) if session.is_active() => {
                session.ended_at = Some(update.ended_at);
                session.duration_seconds = Some(update.duration_seconds);
                Ok(Some(session.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn find_by_id(&self, id: SessionId) -> Result<Option<TrackingSession>, StoreError> {
        let state = self.lock()?;
        Ok(state.sessions.get(&id).cloned())
    }

    async fn find_active(
        &self,
        user_id: &UserId,
        bookmark_id: &BookmarkId,
    ) -> Result<Vec<TrackingSession>, StoreError> {
        let state = self.lock()?;
        let active = state
            .sessions
            .values()
            .filter(|s| s.is_active() && &s.user_id == user_id && &s.bookmark_id == bookmark_id)
            .cloned()
            .collect();
        Ok(Self::newest_first(active))
    }

    async fn find_active_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<TrackingSession>, StoreError> {
        let state = self.lock()?;
        let active = state
            .sessions
            .values()
            .filter(|s| s.is_active() && &s.user_id == user_id)
            .cloned()
            .collect();
        Ok(Self::newest_first(active))
    }

    async fn find_ended(
        &self,
        user_id: &UserId,
        filter: &EndedSessionFilter,
    ) -> Result<Vec<TrackingSession>, StoreError> {
        let state = self.lock()?;
        let mut ended: Vec<TrackingSession> = state
            .sessions
            .values()
            .filter(|s| &s.user_id == user_id && filter.matches(s))
            .cloned()
            .collect();
        ended.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
        Ok(ended)
    }

    async fn find_recent(
        &self,
        user_id: &UserId,
        bookmark_id: &BookmarkId,
        limit: i64,
    ) -> Result<Vec<TrackingSession>, StoreError> {
        let state = self.lock()?;
        let sessions = state
            .sessions
            .values()
            .filter(|s| &s.user_id == user_id && &s.bookmark_id == bookmark_id)
            .cloned()
            .collect();
        let mut sessions = Self::newest_first(sessions);
        sessions.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        Ok(sessions)
    }

    async fn bookmark_title(
        &self,
        user_id: &UserId,
        bookmark_id: &BookmarkId,
    ) -> Result<Option<String>, StoreError> {
        let state = self.lock()?;
        let key = (user_id.clone(), bookmark_id.clone());
        Ok(state
            .visible_bookmarks
            .as_ref()
            .and_then(|registry| registry.get(&key).cloned())
            .flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tracking_session::{SessionMetadata, SessionType};
    use chrono::{Duration, TimeZone, Utc};

    fn ids() -> (UserId, BookmarkId) {
        (
            UserId::parse("user-1").unwrap(),
            BookmarkId::parse("bm-1").unwrap(),
        )
    }

    fn session(user: &UserId, bookmark: &BookmarkId, offset_secs: i64) -> TrackingSession {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        TrackingSession::new(
            bookmark.clone(),
            user.clone(),
            SessionType::View,
            SessionMetadata::new(),
            base + Duration::seconds(offset_secs),
        )
    }

    #[tokio::test]
    async fn insert_rejects_second_active_session_for_pair() {
        let store = MemorySessionStore::new();
        let (user, bookmark) = ids();

        store.insert(&session(&user, &bookmark, 0)).await.expect("first insert");
        let err = store
            .insert(&session(&user, &bookmark, 5))
            .await
            .expect_err("second insert must conflict");
        assert!(matches!(err, StoreError::ActiveSessionExists { .. }));

        let other_bookmark = BookmarkId::parse("bm-2").unwrap();
        store
            .insert(&session(&user, &other_bookmark, 5))
            .await
            .expect("other bookmark is independent");
    }

    #[tokio::test]
    async fn update_only_applies_to_active_sessions() {
        let store = MemorySessionStore::new();
        let (user, bookmark) = ids();
        let created = store.insert(&session(&user, &bookmark, 0)).await.unwrap();

        let update = SessionUpdate {
            ended_at: created.started_at + Duration::seconds(30),
            duration_seconds: 30,
        };
        let ended = store.update(created.id, &update).await.unwrap().expect("ended");
        assert_eq!(ended.duration_seconds, Some(30));

        let second = SessionUpdate {
            ended_at: created.started_at + Duration::seconds(90),
            duration_seconds: 90,
        };
        assert!(store.update(created.id, &second).await.unwrap().is_none());
        let stored = store.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(stored.duration_seconds, Some(30));
    }

    #[tokio::test]
    async fn registered_bookmarks_limit_inserts() {
        let (user, bookmark) = ids();
        let store = MemorySessionStore::with_visible_bookmarks([(user.clone(), bookmark.clone())]);
        let stranger = UserId::parse("user-2").unwrap();

        store.insert(&session(&user, &bookmark, 0)).await.expect("owner");
        let err = store
            .insert(&session(&stranger, &bookmark, 0))
            .await
            .expect_err("stranger");
        assert!(matches!(err, StoreError::BookmarkNotVisible));
    }

    #[tokio::test]
    async fn titles_are_scoped_to_the_owner() {
        let (user, bookmark) = ids();
        let store = MemorySessionStore::with_titled_bookmarks([(
            user.clone(),
            bookmark.clone(),
            "Rust book".to_string(),
        )]);

        assert_eq!(
            store.bookmark_title(&user, &bookmark).await.unwrap().as_deref(),
            Some("Rust book")
        );
        let stranger = UserId::parse("user-2").unwrap();
        assert!(store.bookmark_title(&stranger, &bookmark).await.unwrap().is_none());
        assert!(MemorySessionStore::new()
            .bookmark_title(&user, &bookmark)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn find_recent_orders_newest_first_and_limits() {
        let store = MemorySessionStore::new();
        let (user, bookmark) = ids();
        for offset in [0, 100, 200] {
            let created = store.insert(&session(&user, &bookmark, offset)).await.unwrap();
            let update = SessionUpdate {
                ended_at: created.started_at + Duration::seconds(10),
                duration_seconds: 10,
            };
            store.update(created.id, &update).await.unwrap();
        }

        let recent = store.find_recent(&user, &bookmark, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].started_at > recent[1].started_at);

        let ended = store
            .find_ended(&user, &EndedSessionFilter::default())
            .await
            .unwrap();
        assert_eq!(ended.len(), 3);
        assert!(ended[0].started_at < ended[2].started_at);
    }
}
