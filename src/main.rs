use anyhow::{Context, Result};
use siphon::{ConnectorManager, SiphonConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "siphon=info".into()),
        )
        .init();

    info!("Siphon starting...");

    let config_path =
        std::env::var("SIPHON_CONFIG").unwrap_or_else(|_| "siphon.toml".to_string());

    let config = SiphonConfig::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    info!(
        config = %config_path,
        intake_url = %config.intake.url,
        "Configuration loaded"
    );

    let mut manager = ConnectorManager::new(config);
    let started = manager.start().await.context("Failed to start connectors")?;
    info!(workers = started, "All workers started");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    manager.shutdown().await;

    Ok(())
}
