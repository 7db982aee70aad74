pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::core::{config::Settings, redis::RedisHandle, state::AppState, telemetry};
use crate::services::content_generation::OpenRouterClient;
use crate::services::record_store::PgRecordStore;
use crate::services::status_cache::RedisStatusCache;

/// How long shutdown waits for admitted background jobs.
const JOB_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let redis = RedisHandle::new(settings.redis().redis_url());
    if let Err(err) = redis.connect().await {
        tracing::error!(error = %err, "Failed to connect to Redis; retrying on first use");
    } else {
        tracing::info!("Redis connected successfully");
    }

    let records = Arc::new(PgRecordStore::new(db_pool));
    let statuses = Arc::new(RedisStatusCache::new(redis.clone(), settings.status().ttl_seconds));
    let generator = Arc::new(OpenRouterClient::from_settings(&settings)?);
    let state = AppState::new(settings, redis.clone(), records, statuses, generator);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let background = tasks::scheduler::spawn(state.clone(), shutdown_rx);

    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "Codular API listening"
    );

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(core::shutdown::propagate_shutdown(shutdown_tx))
        .await;

    for handle in background {
        if let Err(err) = handle.await {
            tracing::error!(error = %err, "Background loop panicked");
        }
    }

    if state.jobs().drain(JOB_DRAIN_TIMEOUT).await {
        tracing::info!("Background jobs drained");
    }

    redis.disconnect().await;
    tracing::info!("Redis disconnected");

    result?;

    Ok(())
}
