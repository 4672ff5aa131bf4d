use crate::config::AppConfig;
use crate::db::project_store::ProjectStore;
use crate::llm::LlmManager;
use std::sync::Arc;

/// Shared application state for the web server
pub struct AppState {
    pub config: AppConfig,
    pub llm_manager: Arc<LlmManager>,
    pub project_store: ProjectStore,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(config: AppConfig, llm_manager: LlmManager, project_store: ProjectStore) -> Self {
        Self {
            config,
            llm_manager: Arc::new(llm_manager),
            project_store,
            startup_time: chrono::Utc::now(),
        }
    }
}
