pub mod time_stats;
pub mod time_tracking;

pub use time_stats::TimeStatsService;
pub use time_tracking::TimeTrackingService;
