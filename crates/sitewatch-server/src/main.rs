//! Sitewatch Server binary

use sitewatch_server::{Config, ServerConfig, SitewatchServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration first (needed for logging settings)
    let yaml_config = match Config::load() {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            // Can't use tracing yet - not initialized
            eprintln!("Configuration error: {}", e);
            eprintln!("Using default configuration");
            None
        }
    };

    let (log_format, log_level) = yaml_config
        .as_ref()
        .map(|cfg| (cfg.logging.format.clone(), cfg.logging.level.clone()))
        .unwrap_or_default();
    common::logging::init_with_format(log_format.as_deref(), log_level.as_deref());

    tracing::info!("Sitewatch server starting");

    let server_config = yaml_config
        .map(|cfg| {
            tracing::info!("Configuration loaded successfully");
            cfg.to_server_config()
        })
        .unwrap_or_else(|| {
            tracing::warn!("Using default configuration");
            ServerConfig::default()
        });

    let server = SitewatchServer::new(server_config)?;
    server.run().await?;

    Ok(())
}
