use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::Config;

pub type DbPool = PgPool;

/// Opens the PostgreSQL pool. Connection acquisition shares the store
/// timeout so a saturated pool surfaces as an unavailable store.
pub async fn create_pool(config: &Config) -> anyhow::Result<DbPool> {
    let pool = pool_options(config.db_max_connections, config.store_timeout())
        .connect(&config.database_url)
        .await?;
    Ok(pool)
}

fn pool_options(max_connections: u32, acquire_timeout: Duration) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
}
