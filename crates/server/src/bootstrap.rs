use std::sync::Arc;
use std::time::Duration;

use careline_agent::{
    HeuristicIntentEngine, HttpCapabilityProvider, LlmIntentEngine, MockCapabilityProvider,
    OllamaClient,
};
use careline_core::config::{AppConfig, IntentEngineKind, ProviderBackend};
use careline_core::{CapabilityProvider, IntentEngine, WorkflowEngine};
use careline_db::{connect_with_settings, migrations, ConversationStore, DbPool, PoolSettings};
use thiserror::Error;
use tracing::info;

use crate::chat::ChatState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub store: ConversationStore,
    pub engine: Arc<WorkflowEngine>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("integration setup failed: {0}")]
    Integration(String),
}

impl Application {
    pub fn chat_state(&self) -> ChatState {
        ChatState::new(self.store.clone(), self.engine.clone())
    }
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        PoolSettings::new(config.database.max_connections, config.database.timeout_secs),
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let engine = Arc::new(build_engine(&config)?);
    let store = ConversationStore::new(db_pool.clone());

    Ok(Application { config, db_pool, store, engine })
}

fn build_engine(config: &AppConfig) -> Result<WorkflowEngine, BootstrapError> {
    let provider: Arc<dyn CapabilityProvider> = match config.provider.backend {
        ProviderBackend::Mock => Arc::new(MockCapabilityProvider::default()),
        ProviderBackend::Http => {
            let base_url = config.provider.base_url.clone().unwrap_or_default();
            let api_token = config
                .provider
                .api_token
                .clone()
                .unwrap_or_else(|| String::new().into());
            let client = HttpCapabilityProvider::new(
                base_url,
                api_token,
                Duration::from_secs(config.provider.timeout_secs),
            )
            .map_err(|err| BootstrapError::Integration(err.to_string()))?;
            Arc::new(client)
        }
    };

    let intent_engine: Arc<dyn IntentEngine> = match config.llm.engine {
        IntentEngineKind::Heuristic => Arc::new(HeuristicIntentEngine::default()),
        IntentEngineKind::Ollama => {
            let base_url = config.llm.base_url.clone().unwrap_or_default();
            let client = OllamaClient::new(
                base_url,
                config.llm.model.clone(),
                Duration::from_secs(config.llm.timeout_secs),
            )
            .map_err(|err| BootstrapError::Integration(err.to_string()))?;
            Arc::new(LlmIntentEngine::new(client))
        }
    };

    Ok(WorkflowEngine::new(
        provider,
        intent_engine,
        config.provider.verification_credential.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use careline_core::config::{AppConfig, ConfigOverrides, LoadOptions};

    use super::bootstrap_with_config;

    fn memory_options() -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:?cache=shared".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_applies_migrations_and_wires_the_engine() {
        std::env::set_var("CARELINE_VERIFICATION_CREDENTIAL", "bootstrap-test-credential");

        let config = AppConfig::load(memory_options()).expect("config loads");
        let app = bootstrap_with_config(config).await.expect("bootstrap succeeds");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'conversations'",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema query");
        assert_eq!(table_count, 1);

        app.db_pool.close().await;
        std::env::remove_var("CARELINE_VERIFICATION_CREDENTIAL");
    }
}
