use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use leadline_agent::{
    ChatModel, ConversationEngine, HttpIngestSink, LeadSink, OpenAiChatModel, StoreSink,
};
use leadline_core::config::{AppConfig, ConfigError, LoadOptions};
use leadline_db::{connect_with_settings, migrations, DbPool, LeadStore, SqlLeadStore};
use leadline_tracker::{RemoteTracker, TrackerClient};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub lead_store: Arc<dyn LeadStore>,
    pub tracker: Arc<dyn RemoteTracker>,
    pub engine: Arc<ConversationEngine>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("http client construction failed: {0}")]
    HttpClient(#[source] reqwest::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
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

    let lead_store: Arc<dyn LeadStore> = Arc::new(SqlLeadStore::new(db_pool.clone()));

    let tracker: Arc<dyn RemoteTracker> =
        Arc::new(TrackerClient::from_config(&config.tracker).map_err(BootstrapError::HttpClient)?);
    info!(
        event_name = "system.bootstrap.tracker_ready",
        correlation_id = "bootstrap",
        connected = tracker.is_connected(),
        list_id_configured = tracker.list_id_configured(),
        "remote tracker client ready"
    );

    let model: Option<Arc<dyn ChatModel>> =
        OpenAiChatModel::from_config(&config.llm)
            .map_err(BootstrapError::HttpClient)?
            .map(|model| Arc::new(model) as Arc<dyn ChatModel>);
    info!(
        event_name = "system.bootstrap.model_ready",
        correlation_id = "bootstrap",
        enabled = model.is_some(),
        "chat model configured"
    );

    let sink: Arc<dyn LeadSink> = match &config.ingest.callback_base_url {
        Some(base_url) => Arc::new(
            HttpIngestSink::new(base_url, config.tracker.timeout_secs)
                .map_err(BootstrapError::HttpClient)?,
        ),
        None => Arc::new(StoreSink::new(lead_store.clone())),
    };

    let engine = Arc::new(ConversationEngine::new(
        model,
        sink,
        tracker.clone(),
        Duration::from_secs(config.agent.session_idle_secs),
        config.agent.validate_phone,
    ));

    Ok(Application { config, db_pool, lead_store, tracker, engine })
}
