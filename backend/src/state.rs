use std::sync::Arc;

use crate::{
    config::Config,
    repositories::SessionStore,
    services::{time_stats::TimeStatsService, time_tracking::TimeTrackingService},
    utils::{Clock, SystemClock},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub tracker: TimeTrackingService,
    pub stats: TimeStatsService,
}

impl AppState {
    /// Wires both services to one store, using the wall clock.
    pub fn new(config: Config, store: Arc<dyn SessionStore>) -> Self {
        let clock = Arc::new(SystemClock::new(config.time_zone));
        Self::with_clock(config, store, clock)
    }

    pub fn with_clock(config: Config, store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>) -> Self {
        let timeout = config.store_timeout();
        let tracker = TimeTrackingService::new(store.clone(), clock.clone(), timeout);
        let stats = TimeStatsService::new(store, clock, config.time_zone, timeout);
        Self {
            config,
            tracker,
            stats,
        }
    }
}
