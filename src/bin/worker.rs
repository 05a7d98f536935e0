use evidence_verify::{
    app_state::AppState,
    config::AppConfig,
    db,
    services::dispatch::{Dispatcher, WorkerPool},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting verification worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // Initialize database
    tracing::info!("Connecting to PostgreSQL");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    // Jobs queued by the API server arrive through polling; local wake-ups
    // come from full-profile follow-ups this process queues itself.
    let (dispatcher, receiver) = Dispatcher::channel();
    let state = AppState::from_config(db_pool, &config, dispatcher)
        .expect("Failed to initialize worker state");

    tracing::info!(
        concurrency = state.settings.worker_concurrency,
        poll_ms = config.poll_interval_ms,
        "Worker ready, starting job processing loop"
    );

    WorkerPool::run_until(state, receiver, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    })
    .await;

    tracing::info!("Worker stopped");
}
