//! Statistics over ended tracking sessions.
//!
//! Nothing is cached; each call reads the sessions it needs and folds them
//! with the pure functions below.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::error::TrackingError;
use crate::models::time_stats::{
    BookmarkTimeStats, BookmarkUsage, DailyUsage, SessionTypeUsage, TimeAnalytics, UserTimeStats,
};
use crate::models::tracking_session::{SessionType, TrackingSession};
use crate::repositories::session_store::{bounded, EndedSessionFilter, SessionStore};
use crate::types::{BookmarkId, UserId};
use crate::utils::{local_date, start_of_local_day, Clock};

/// Window used for `daily_average`.
pub const DAILY_AVERAGE_WINDOW_DAYS: i64 = 30;
/// Longest range accepted by analytics, both ends included.
pub const MAX_ANALYTICS_RANGE_DAYS: i64 = 366;

#[derive(Clone)]
pub struct TimeStatsService {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    tz: Tz,
    store_timeout: Duration,
}

impl TimeStatsService {
    pub fn new(
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
        tz: Tz,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            tz,
            store_timeout,
        }
    }

    async fn ended(
        &self,
        user_id: &UserId,
        filter: &EndedSessionFilter,
    ) -> Result<Vec<TrackingSession>, TrackingError> {
        let sessions = bounded(
            "find_ended",
            self.store_timeout,
            self.store.find_ended(user_id, filter),
        )
        .await?;
        Ok(sessions)
    }

    pub async fn get_bookmark_time_stats(
        &self,
        bookmark_id: &str,
        user_id: &str,
    ) -> Result<BookmarkTimeStats, TrackingError> {
        let bookmark_id = BookmarkId::parse(bookmark_id)?;
        let user_id = UserId::parse(user_id)?;

        let sessions = self
            .ended(&user_id, &EndedSessionFilter::for_bookmark(bookmark_id))
            .await?;
        Ok(summarize_bookmark(&sessions))
    }

    pub async fn get_user_time_stats(&self, user_id: &str) -> Result<UserTimeStats, TrackingError> {
        let user_id = UserId::parse(user_id)?;

        let sessions = self.ended(&user_id, &EndedSessionFilter::default()).await?;
        let mut stats = summarize_user(&sessions, self.clock.now());

        if let Some(usage) = stats.most_used_bookmark.as_mut() {
            usage.title = bounded(
                "bookmark_title",
                self.store_timeout,
                self.store.bookmark_title(&user_id, &usage.bookmark_id),
            )
            .await?;
        }
        Ok(stats)
    }

    /// Per-day and per-type breakdown of sessions started between two local
    /// calendar dates, both included.
    pub async fn get_time_analytics(
        &self,
        user_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<TimeAnalytics, TrackingError> {
        let user_id = UserId::parse(user_id)?;

        if start_date > end_date {
            return Err(TrackingError::InvalidInput(
                "start_date must not be after end_date".into(),
            ));
        }
        if (end_date - start_date).num_days() + 1 > MAX_ANALYTICS_RANGE_DAYS {
            return Err(TrackingError::InvalidInput(format!(
                "date range must not exceed {} days",
                MAX_ANALYTICS_RANGE_DAYS
            )));
        }
        let day_after_end = end_date.succ_opt().ok_or_else(|| {
            TrackingError::InvalidInput("end_date is out of range".into())
        })?;

        let filter = EndedSessionFilter::started_between(
            start_of_local_day(start_date, &self.tz),
            start_of_local_day(day_after_end, &self.tz),
        );
        let sessions = self.ended(&user_id, &filter).await?;
        Ok(summarize_analytics(&sessions, &self.tz))
    }
}

fn ended_durations(
    sessions: &[TrackingSession],
) -> impl Iterator<Item = (&TrackingSession, i64)> + '_ {
    sessions
        .iter()
        .filter_map(|session| session.duration_seconds.map(|duration| (session, duration)))
}

fn average(total: i64, count: i64) -> i64 {
    if count == 0 {
        0
    } else {
        total / count
    }
}

/// Totals for one bookmark. Active sessions are ignored.
pub fn summarize_bookmark(sessions: &[TrackingSession]) -> BookmarkTimeStats {
    let mut stats = BookmarkTimeStats::default();
    let mut last: Option<(DateTime<Utc>, DateTime<Utc>)> = None;

    for (session, duration) in ended_durations(sessions) {
        stats.total_time_spent += duration;
        stats.session_count += 1;
        stats.longest_session_time = stats.longest_session_time.max(duration);

        // ended_at is always set alongside duration_seconds.
        let key = (session.ended_at.unwrap_or(session.started_at), session.started_at);
        if last.map_or(true, |current| key > current) {
            last = Some(key);
            stats.last_session_time = duration;
        }
    }

    stats.average_session_time = average(stats.total_time_spent, stats.session_count);
    stats
}

/// Totals across every bookmark of a user as of `now`.
pub fn summarize_user(sessions: &[TrackingSession], now: DateTime<Utc>) -> UserTimeStats {
    let window_start = now - chrono::Duration::days(DAILY_AVERAGE_WINDOW_DAYS);
    let mut stats = UserTimeStats::default();
    let mut per_bookmark: BTreeMap<&BookmarkId, i64> = BTreeMap::new();
    let mut recent_total = 0;

    for (session, duration) in ended_durations(sessions) {
        stats.total_time_spent += duration;
        stats.total_sessions += 1;
        *per_bookmark.entry(&session.bookmark_id).or_default() += duration;
        if session.started_at >= window_start {
            recent_total += duration;
        }
    }

    stats.average_session_time = average(stats.total_time_spent, stats.total_sessions);
    stats.daily_average = recent_total / DAILY_AVERAGE_WINDOW_DAYS;

    // BTreeMap iterates ids ascending, so the first maximum wins ties.
    let mut best: Option<(&BookmarkId, i64)> = None;
    for (bookmark_id, time_spent) in per_bookmark {
        if time_spent > 0 && best.map_or(true, |(_, current)| time_spent > current) {
            best = Some((bookmark_id, time_spent));
        }
    }
    stats.most_used_bookmark = best.map(|(bookmark_id, time_spent)| BookmarkUsage {
        bookmark_id: bookmark_id.clone(),
        title: None,
        time_spent,
    });

    stats
}

/// Groups sessions by local start date and by session type.
pub fn summarize_analytics(sessions: &[TrackingSession], tz: &Tz) -> TimeAnalytics {
    let mut analytics = TimeAnalytics::default();
    let mut days: BTreeMap<NaiveDate, (i64, i64)> = BTreeMap::new();
    let mut types: BTreeMap<SessionType, (i64, i64)> = BTreeMap::new();

    for (session, duration) in ended_durations(sessions) {
        analytics.total_time += duration;
        analytics.sessions += 1;

        let day = days.entry(local_date(session.started_at, tz)).or_default();
        day.0 += duration;
        day.1 += 1;

        let by_type = types.entry(session.session_type).or_default();
        by_type.0 += duration;
        by_type.1 += 1;
    }

    analytics.daily_breakdown = days
        .into_iter()
        .map(|(date, (time, sessions))| DailyUsage {
            date,
            time,
            sessions,
        })
        .collect();

    let mut breakdown: Vec<SessionTypeUsage> = types
        .into_iter()
        .map(|(session_type, (time, sessions))| SessionTypeUsage {
            session_type,
            time,
            sessions,
        })
        .collect();
    breakdown.sort_by(|a, b| {
        b.time
            .cmp(&a.time)
            .then_with(|| a.session_type.as_str().cmp(b.session_type.as_str()))
    });
    analytics.session_type_breakdown = breakdown;

    analytics
}
