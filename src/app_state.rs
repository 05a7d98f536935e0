use sqlx::PgPool;
use std::sync::Arc;

use crate::config::{AppConfig, EngineSettings};
use crate::services::{
    assessment::{AssessmentService, WorkersAiAssessor},
    dispatch::Dispatcher,
    document_cache::DocumentTextCache,
    fetch::{DocumentFetcher, FetchError, HttpDocumentFetcher},
};

/// Shared state passed to route handlers and worker loops.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub assessor: Arc<dyn AssessmentService>,
    pub fetcher: Arc<dyn DocumentFetcher>,
    pub dispatcher: Dispatcher,
    pub settings: Arc<EngineSettings>,
}

impl AppState {
    pub fn new(
        db: PgPool,
        assessor: Arc<dyn AssessmentService>,
        fetcher: Arc<dyn DocumentFetcher>,
        dispatcher: Dispatcher,
        settings: EngineSettings,
    ) -> Self {
        Self {
            db,
            assessor,
            fetcher,
            dispatcher,
            settings: Arc::new(settings),
        }
    }

    /// Wire the production collaborators described by `config`.
    pub fn from_config(
        db: PgPool,
        config: &AppConfig,
        dispatcher: Dispatcher,
    ) -> Result<Self, FetchError> {
        let settings = config.engine_settings();

        let assessor = WorkersAiAssessor::new(
            config.cf_account_id.clone(),
            config.cf_api_token.clone(),
            config.assessment_model.clone(),
        );
        if !assessor.is_configured() {
            tracing::warn!("Workers AI credentials missing; assessments will use the neutral default");
        }

        let fetcher = HttpDocumentFetcher::new(settings.document_fetch_timeout)?;

        Ok(Self::new(
            db,
            Arc::new(assessor),
            Arc::new(fetcher),
            dispatcher,
            settings,
        ))
    }

    pub fn document_cache(&self) -> DocumentTextCache<'_> {
        DocumentTextCache::new(
            &self.db,
            Arc::clone(&self.fetcher),
            self.settings.document_max_bytes,
            self.settings.document_preview_chars,
        )
    }
}
