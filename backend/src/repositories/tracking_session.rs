//! PostgreSQL session store.
//!
//! The partial unique index `bookmark_sessions_one_active` (see migrations)
//! enforces at most one active session per (user, bookmark) pair.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::models::tracking_session::TrackingSession;
use crate::repositories::common::push_clause;
use crate::repositories::session_store::{
    EndedSessionFilter, SessionStore, SessionUpdate, StoreError,
};
use crate::types::{BookmarkId, SessionId, UserId};

const TABLE_NAME: &str = "bookmark_sessions";
const SELECT_COLUMNS: &str =
    "id, bookmark_id, user_id, session_type, started_at, ended_at, duration_seconds, metadata";
const ACTIVE_UNIQUE_INDEX: &str = "bookmark_sessions_one_active";

#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn base_select_query() -> String {
        format!("SELECT {} FROM {}", SELECT_COLUMNS, TABLE_NAME)
    }
}

fn is_active_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation() && db_err.constraint() == Some(ACTIVE_UNIQUE_INDEX)
        }
        _ => false,
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn bookmark_title(
        &self,
        user_id: &UserId,
        bookmark_id: &BookmarkId,
    ) -> Result<Option<String>, StoreError> {
        let title = sqlx::query_scalar::<_, String>(
            "SELECT title FROM bookmarks WHERE id = $1 AND user_id = $2",
        )
        .bind(bookmark_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(title)
    }

    async fn insert(&self, session: &TrackingSession) -> Result<TrackingSession, StoreError> {
        // The bookmark must exist and belong to the caller.
        let query = format!(
            "INSERT INTO {} (id, bookmark_id, user_id, session_type, started_at, metadata) \
             SELECT $1, $2, $3, $4, $5, $6 \
             WHERE EXISTS (SELECT 1 FROM bookmarks WHERE id = $2 AND user_id = $3) \
             RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS
        );
        let result = sqlx::query_as::<_, TrackingSession>(&query)
            .bind(session.id)
            .bind(&session.bookmark_id)
            .bind(&session.user_id)
            .bind(session.session_type.as_str())
            .bind(session.started_at)
            .bind(Json(&session.metadata))
            .fetch_optional(&self.pool)
            .await;

        match result {
            Ok(Some(row)) => Ok(row),
            Ok(None) => Err(StoreError::BookmarkNotVisible),
            Err(err) if is_active_conflict(&err) => Err(StoreError::ActiveSessionExists {
                user_id: session.user_id.clone(),
                bookmark_id: session.bookmark_id.clone(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    async fn update(
        &self,
        id: SessionId,
        update: &SessionUpdate,
    ) -> Result<Option<TrackingSession>, StoreError> {
        let query = format!(
            "UPDATE {} SET ended_at = $2, duration_seconds = $3, updated_at = NOW() \
             WHERE id = $1 AND ended_at IS NULL \
             RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, TrackingSession>(&query)
            .bind(id)
            .bind(update.ended_at)
            .bind(update.duration_seconds)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_by_id(&self, id: SessionId) -> Result<Option<TrackingSession>, StoreError> {
        let query = format!("{} WHERE id = $1", Self::base_select_query());
        let row = sqlx::query_as::<_, TrackingSession>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_active(
        &self,
        user_id: &UserId,
        bookmark_id: &BookmarkId,
    ) -> Result<Vec<TrackingSession>, StoreError> {
        let query = format!(
            "{} WHERE user_id = $1 AND bookmark_id = $2 AND ended_at IS NULL \
             ORDER BY started_at DESC, id DESC",
            Self::base_select_query()
        );
        let rows = sqlx::query_as::<_, TrackingSession>(&query)
            .bind(user_id)
            .bind(bookmark_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn find_active_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<TrackingSession>, StoreError> {
        let query = format!(
            "{} WHERE user_id = $1 AND ended_at IS NULL ORDER BY started_at DESC, id DESC",
            Self::base_select_query()
        );
        let rows = sqlx::query_as::<_, TrackingSession>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn find_ended(
        &self,
        user_id: &UserId,
        filter: &EndedSessionFilter,
    ) -> Result<Vec<TrackingSession>, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new(Self::base_select_query());
        let mut has_clause = false;

        push_clause(&mut builder, &mut has_clause);
        builder.push("user_id = ").push_bind(user_id);
        push_clause(&mut builder, &mut has_clause);
        builder.push("ended_at IS NOT NULL");

        if let Some(bookmark_id) = &filter.bookmark_id {
            push_clause(&mut builder, &mut has_clause);
            builder.push("bookmark_id = ").push_bind(bookmark_id);
        }
        if let Some(from) = filter.started_from {
            push_clause(&mut builder, &mut has_clause);
            builder.push("started_at >= ").push_bind(from);
        }
        if let Some(before) = filter.started_before {
            push_clause(&mut builder, &mut has_clause);
            builder.push("started_at < ").push_bind(before);
        }
        builder.push(" ORDER BY started_at ASC, id ASC");

        let rows = builder
            .build_query_as::<TrackingSession>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn find_recent(
        &self,
        user_id: &UserId,
        bookmark_id: &BookmarkId,
        limit: i64,
    ) -> Result<Vec<TrackingSession>, StoreError> {
        let query = format!(
            "{} WHERE user_id = $1 AND bookmark_id = $2 \
             ORDER BY started_at DESC, id DESC LIMIT $3",
            Self::base_select_query()
        );
        let rows = sqlx::query_as::<_, TrackingSession>(&query)
            .bind(user_id)
            .bind(bookmark_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
