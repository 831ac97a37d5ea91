//! Telemetry and Observability
//!
//! Structured logging setup.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogSettings;

/// Initialize tracing subscriber
pub fn init_tracing(settings: &LogSettings) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,chat_relay=debug,sqlx=warn,tower_http=debug"));

    let registry = tracing_subscriber::registry().with(env_filter);

    if settings.json {
        registry
            .with(fmt::layer().json().with_current_span(true).with_target(true))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init();
    }

    tracing::info!("Tracing initialized");
}
