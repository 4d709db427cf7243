//! Read-only rollups computed over ended tracking sessions.
//!
//! All values are whole seconds; averages truncate.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::tracking_session::SessionType;
use crate::types::BookmarkId;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BookmarkTimeStats {
    pub total_time_spent: i64,
    pub session_count: i64,
    pub average_session_time: i64,
    /// Duration of the most recently ended session.
    pub last_session_time: i64,
    pub longest_session_time: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BookmarkUsage {
    #[schema(value_type = String)]
    pub bookmark_id: BookmarkId,
    /// `None` when the bookmark catalog has no entry for the id.
    pub title: Option<String>,
    pub time_spent: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserTimeStats {
    pub total_time_spent: i64,
    pub total_sessions: i64,
    pub average_session_time: i64,
    pub most_used_bookmark: Option<BookmarkUsage>,
    /// Time tracked over the trailing window divided by its length in days.
    pub daily_average: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub time: i64,
    pub sessions: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SessionTypeUsage {
    pub session_type: SessionType,
    pub time: i64,
    pub sessions: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TimeAnalytics {
    pub total_time: i64,
    pub sessions: i64,
    pub daily_breakdown: Vec<DailyUsage>,
    pub session_type_breakdown: Vec<SessionTypeUsage>,
}
