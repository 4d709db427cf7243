use chrono::{DateTime, Duration, LocalResult, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// Source of "now" for session lifecycle timestamps.
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock aligned with the configured timezone.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        now_utc(&self.tz)
    }
}

/// Returns the current time in the configured timezone.
pub fn now_in_timezone(tz: &Tz) -> DateTime<Tz> {
    Utc::now().with_timezone(tz)
}

/// Returns the current UTC time, aligned with the configured timezone.
pub fn now_utc(tz: &Tz) -> DateTime<Utc> {
    now_in_timezone(tz).with_timezone(&Utc)
}

/// Calendar date of an instant in the configured timezone.
pub fn local_date(instant: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

/// First UTC instant that falls on `date` in `tz`.
///
/// Midnight can be skipped by a DST transition; in that case the first
/// existing local minute of the day is used.
pub fn start_of_local_day(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    let mut candidate = midnight;
    for _ in 0..=(24 * 60) {
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(dt) => return dt.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => return earliest.with_timezone(&Utc),
            LocalResult::None => candidate += Duration::minutes(1),
        }
    }
    midnight.and_utc()
}
