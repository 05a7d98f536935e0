use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use std::sync::Arc;

use crate::db::queries;

/// State for the scrape endpoint, kept apart from [`crate::app_state::AppState`].
#[derive(Clone)]
pub struct MetricsState {
    pub handle: Arc<PrometheusHandle>,
    pub db: PgPool,
}

/// Prometheus metrics scrape endpoint.
/// Refreshes the queue-depth gauge, then renders the text exposition format.
pub async fn prometheus_metrics(State(state): State<MetricsState>) -> impl IntoResponse {
    match queries::queue_depth(&state.db).await {
        Ok(depth) => metrics::gauge!("verification_queue_depth").set(depth as f64),
        Err(e) => tracing::warn!(error = %e, "Failed to read queue depth"),
    }

    state.handle.render()
}
