mod bootstrap;
mod health;
pub mod leads;

use std::sync::Arc;

use anyhow::Result;
use leadline_core::config::{AppConfig, LoadOptions};
use leadline_telegram::{
    api::TelegramApiTransport, EngineMessageService, PollingRunner, ReconnectPolicy,
    UpdateDispatcher,
};

fn init_logging(config: &AppConfig) {
    use leadline_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    // Now bootstrap using the same config we already loaded
    let app = bootstrap::bootstrap_with_config(config).await?;

    spawn_api(&app).await?;

    let transport = Arc::new(TelegramApiTransport::from_config(&app.config.telegram)?);
    let dispatcher = UpdateDispatcher::new(Arc::new(EngineMessageService::new(app.engine.clone())));
    let runner = PollingRunner::new(transport, dispatcher, ReconnectPolicy::default());

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        "leadline-server started"
    );
    runner.start().await?;

    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "leadline-server stopping"
    );

    Ok(())
}

async fn spawn_api(app: &bootstrap::Application) -> std::io::Result<()> {
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(
        event_name = "system.api.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "lead query api started"
    );

    let router = leads::router(app.lead_store.clone(), app.tracker.clone())
        .merge(health::router(app.db_pool.clone()));

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router).await {
            tracing::error!(
                event_name = "system.api.error",
                correlation_id = "bootstrap",
                error = %error,
                "lead query api terminated unexpectedly"
            );
        }
    });

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
