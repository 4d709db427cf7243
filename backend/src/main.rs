use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bookmark_tracker_backend::{
    config::{Config, StoreBackend},
    db::create_pool,
    repositories::{MemorySessionStore, PgSessionStore, SessionStore},
    routes::build_router,
    state::AppState,
};

fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "<empty>".into();
    }
    let prefix = s.chars().take(4).collect::<String>();
    format!("{}*** (len={})", prefix, s.len())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bookmark_tracker_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!(
        jwt_secret = %mask_secret(&config.jwt_secret),
        time_zone = %config.time_zone,
        session_store = %config.session_store,
        store_timeout_ms = config.store_timeout_ms,
        bind_addr = %config.bind_addr,
        "Loaded configuration from environment/.env"
    );

    let store: Arc<dyn SessionStore> = match config.session_store {
        StoreBackend::Postgres => {
            let pool = create_pool(&config).await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            Arc::new(PgSessionStore::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory session store; sessions are lost on restart");
            Arc::new(MemorySessionStore::new())
        }
    };

    let addr = config.bind_addr;
    let app = build_router(AppState::new(config, store));

    tracing::info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
