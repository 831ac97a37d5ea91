//! # Chat Relay
//!
//! Entry point for one relay instance. Initializes:
//! - Configuration loading
//! - Tracing/logging subsystem
//! - Database connection pool
//! - Cross-instance event bus
//! - HTTP/WebSocket server

use anyhow::Result;
use tracing::info;

use chat_relay::config::Settings;
use chat_relay::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    // Settings first: the log format is configurable
    let settings = Settings::load()?;
    chat_relay::telemetry::init_tracing(&settings.log);

    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        instance_id = %settings.instance.id,
        bus = ?settings.bus.kind,
        "Configuration loaded"
    );

    // Build and run the application
    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
