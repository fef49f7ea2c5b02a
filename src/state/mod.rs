use std::sync::Arc;
use std::time::Duration;

use crate::chat::{AnswerEngine, RatingCollector, TurnController};
use crate::core::config::{AppConfig, AppPaths, ConfigService};
use crate::flags::SqliteFlagStore;
use crate::llm::{LlmProvider, OpenAiClient};
use crate::rag::{DocumentIndex, IndexHandle, RagAnswerEngine};

pub mod error;
pub mod sessions;

use error::InitializationError;
use sessions::SessionRegistry;

/// Global application state shared across all routes.
///
/// Contains:
/// - The typed configuration
/// - The live session registry
/// - The once-built document index
/// - The flag store and the two event handlers built on it
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub sessions: SessionRegistry,
    pub index: IndexHandle,
    pub flags: Arc<SqliteFlagStore>,
    pub controller: TurnController,
    pub ratings: RatingCollector,
}

impl AppState {
    /// Initializes the application state.
    ///
    /// This process includes:
    /// 1. Loading and validating configuration
    /// 2. Building the document index (once per process)
    /// 3. Wiring the answer engine and flag store into the event handlers
    pub async fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let config_service = ConfigService::new(paths.clone());
        let config = config_service
            .load_app_config()
            .map_err(|e| InitializationError::Config(e.into()))?;

        let llm: Arc<dyn LlmProvider> = Arc::new(OpenAiClient::from_config(&config.llm));
        if config.llm.api_key.is_none() {
            tracing::warn!("No LLM API key configured; requests are sent unauthenticated");
        }

        let data_dir = config_service.data_dir(&config);
        let index = IndexHandle::new();
        let built = index
            .build_once(|| DocumentIndex::build(&data_dir, &config.index, llm.as_ref()))
            .await
            .map_err(|e| InitializationError::Index(e.into()))?;
        tracing::info!("Document index ready with {} chunks", built.len());

        let engine: Arc<dyn AnswerEngine> = Arc::new(RagAnswerEngine::new(
            llm,
            index.clone(),
            config.index.top_k,
            config.llm.temperature,
        ));
        let flags = Arc::new(SqliteFlagStore::new(config_service.flag_db_path(&config)));
        tracing::info!("Flagged questions are stored in {}", flags.db_path().display());

        Ok(Self::from_parts(config, index, engine, flags))
    }

    /// Assembles state from already-built parts.
    pub fn from_parts(
        config: AppConfig,
        index: IndexHandle,
        engine: Arc<dyn AnswerEngine>,
        flags: Arc<SqliteFlagStore>,
    ) -> Arc<Self> {
        let controller = TurnController::new(engine, flags.clone());
        let ratings = RatingCollector::new(flags.clone());
        let sessions =
            SessionRegistry::with_idle_timeout(Duration::from_secs(config.server.session_idle_secs));

        Arc::new(AppState {
            config: Arc::new(config),
            sessions,
            index,
            flags,
            controller,
            ratings,
        })
    }
}
