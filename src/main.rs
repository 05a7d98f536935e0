use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use evidence_verify::{
    app_state::AppState,
    config::AppConfig,
    db, routes,
    routes::metrics::MetricsState,
    services::dispatch::{Dispatcher, WorkerPool},
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing evidence-verify server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!(
        "verification_jobs_enqueued_total",
        "Verification jobs queued, by aspect"
    );
    metrics::describe_counter!(
        "verification_jobs_succeeded_total",
        "Verification jobs that succeeded, by aspect"
    );
    metrics::describe_counter!(
        "verification_jobs_failed_total",
        "Verification jobs that failed, by aspect"
    );
    metrics::describe_counter!(
        "verification_assessment_attempts_total",
        "Assessment service calls, including retries"
    );
    metrics::describe_histogram!(
        "verification_assessment_seconds",
        "Duration of a single assessment attempt"
    );
    metrics::describe_gauge!(
        "verification_jobs_in_flight",
        "Jobs currently being processed by this process"
    );
    metrics::describe_gauge!(
        "verification_queue_depth",
        "Jobs waiting to be claimed"
    );
    metrics::describe_counter!(
        "document_text_cache_hits_total",
        "Document text served from the cache"
    );
    metrics::describe_counter!(
        "document_text_cache_misses_total",
        "Document text that had to be fetched and extracted"
    );

    // Initialize database connection pool
    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run database migrations
    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    // Create shared application state
    let (dispatcher, receiver) = Dispatcher::channel();
    let state = AppState::from_config(db_pool.clone(), &config, dispatcher)
        .expect("Failed to initialize application state");

    if config.embedded_workers {
        tracing::info!(
            concurrency = state.settings.worker_concurrency,
            "Starting embedded worker pool"
        );
        WorkerPool::spawn(state.clone(), receiver);
    } else {
        tracing::info!("Embedded workers disabled; run the worker binary to process jobs");
    }

    let metrics_state = MetricsState {
        handle: prometheus_handle,
        db: db_pool,
    };

    // Build API routes
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route(
            "/api/v1/candidates/{candidate_id}/verification",
            post(routes::verification::trigger_verification)
                .get(routes::verification::get_verification_status),
        )
        .route(
            "/api/v1/candidates/{candidate_id}/verification/{aspect}",
            post(routes::verification::request_aspect),
        )
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(metrics_state),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(1024 * 1024)); // 1 MB limit

    tracing::info!("Starting evidence-verify on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
