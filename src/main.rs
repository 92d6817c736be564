//! # Community Hub
//!
//! Entry point: loads configuration, initializes logging, then serves the
//! REST API and the real-time hub until interrupted.

use anyhow::Result;
use tracing::info;

use community_hub::config::Settings;
use community_hub::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    // Settings decide the log format, so they load before tracing exists.
    let settings = Settings::load()?;
    community_hub::telemetry::init_tracing(settings.json_logs());

    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        redis = settings.redis.enabled,
        "Configuration loaded"
    );

    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    info!("Server stopped");
    Ok(())
}
