//! Models that capture time spent on a bookmark.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::types::{BookmarkId, SessionId, UserId};

/// How a session was initiated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum SessionType {
    #[default]
    View,
    Focus,
    Timer,
    Research,
    Reading,
    ExternalVisit,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::View => "view",
            SessionType::Focus => "focus",
            SessionType::Timer => "timer",
            SessionType::Research => "research",
            SessionType::Reading => "reading",
            SessionType::ExternalVisit => "external-visit",
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a stored or supplied session type tag is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown session type: {0}")]
pub struct UnknownSessionType(pub String);

impl FromStr for SessionType {
    type Err = UnknownSessionType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(SessionType::View),
            "focus" => Ok(SessionType::Focus),
            "timer" => Ok(SessionType::Timer),
            "research" => Ok(SessionType::Research),
            "reading" => Ok(SessionType::Reading),
            "external-visit" => Ok(SessionType::ExternalVisit),
            other => Err(UnknownSessionType(other.to_string())),
        }
    }
}

impl TryFrom<String> for SessionType {
    type Error = UnknownSessionType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A single primitive metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

/// Caller-supplied key/value bag recorded with a session and never interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionMetadata(BTreeMap<String, MetadataValue>);

impl SessionMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetadataValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<MetadataValue>> FromIterator<(K, V)> for SessionMetadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
/// Persistent representation of one interval spent on a bookmark.
pub struct TrackingSession {
    /// Unique identifier for the session.
    #[schema(value_type = String)]
    pub id: SessionId,
    /// Bookmark being tracked.
    #[schema(value_type = String)]
    pub bookmark_id: BookmarkId,
    /// Owner of the session.
    #[schema(value_type = String)]
    pub user_id: UserId,
    #[sqlx(try_from = "String")]
    pub session_type: SessionType,
    /// Timestamp when the session started.
    pub started_at: DateTime<Utc>,
    /// Timestamp when the session ended, if it has.
    pub ended_at: Option<DateTime<Utc>>,
    /// Whole seconds between start and end, filled when the session ends.
    pub duration_seconds: Option<i64>,
    #[sqlx(json)]
    #[schema(value_type = Object)]
    pub metadata: SessionMetadata,
}

impl TrackingSession {
    /// Creates a session that starts immediately.
    pub fn new(
        bookmark_id: BookmarkId,
        user_id: UserId,
        session_type: SessionType,
        metadata: SessionMetadata,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            bookmark_id,
            user_id,
            session_type,
            started_at,
            ended_at: None,
            duration_seconds: None,
            metadata,
        }
    }

    /// Returns `true` while the session has not ended.
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Marks the session as ended and computes its duration.
    ///
    /// Ending an already ended session leaves it untouched.
    pub fn end_at(&mut self, ended_at: DateTime<Utc>) {
        if !self.is_active() {
            return;
        }
        self.ended_at = Some(ended_at);
        self.duration_seconds = Some(duration_between(self.started_at, ended_at));
    }

    /// Seconds elapsed so far for an active session, or the recorded duration.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        match self.duration_seconds {
            Some(duration) => duration,
            None => duration_between(self.started_at, now),
        }
    }
}

/// Whole seconds from `start` to `end`, clamped at zero.
pub fn duration_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_seconds().max(0)
}
