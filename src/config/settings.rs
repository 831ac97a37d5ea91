//! Application settings and configuration structures.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use uuid::Uuid;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Database configuration (PostgreSQL)
    pub database: DatabaseSettings,

    /// Redis configuration
    pub redis: RedisSettings,

    /// Cross-instance event bus
    pub bus: BusSettings,

    /// Identity of this running process on the bus
    pub instance: InstanceSettings,

    /// JWT authentication settings
    pub jwt: JwtSettings,

    /// CORS configuration
    pub cors: CorsSettings,

    /// WebSocket configuration
    pub websocket: WebSocketSettings,

    /// Log output format
    pub log: LogSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// PostgreSQL database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    /// Redis connection URL
    pub url: String,
}

/// Which bus implementation carries cross-instance envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    /// Redis pub/sub, shared by every instance
    Redis,
    /// In-process broadcast; only valid for a single standalone instance
    Memory,
}

/// Event bus configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BusSettings {
    pub kind: BusKind,

    /// Channel multiplexing every conversation
    pub channel: String,

    /// Delay before the subscriber reconnects after losing the bus
    pub reconnect_delay_ms: u64,

    /// Number of recently distributed message ids kept for duplicate suppression
    pub dedup_window: usize,
}

/// Instance identity.
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceSettings {
    /// Origin tag stamped on every published envelope
    pub id: String,
}

/// JWT authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Secret key for signing tokens
    pub secret: String,

    /// Token lifetime in minutes
    pub expiry_minutes: i64,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Allowed origins (comma-separated in env)
    pub allowed_origins: Vec<String>,
}

/// WebSocket configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketSettings {
    /// Maximum message size in bytes (default: 64KB)
    pub max_message_size: usize,

    /// Maximum frame size in bytes (default: 16KB)
    pub max_frame_size: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogSettings {
    pub json: bool,
}

/// Minimum required length for JWT secret (256 bits = 32 bytes)
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Channel used when none is configured.
pub const DEFAULT_BUS_CHANNEL: &str = "chat.messages";

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if JWT secret is too short.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5000)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("bus.kind", "redis")?
            .set_default("bus.channel", DEFAULT_BUS_CHANNEL)?
            .set_default("bus.reconnect_delay_ms", 1000_i64)?
            .set_default("bus.dedup_window", 4096_i64)?
            // A fresh id per process keeps two unconfigured instances from
            // suppressing each other's envelopes.
            .set_default("instance.id", Uuid::new_v4().to_string())?
            .set_default("jwt.expiry_minutes", 60 * 24 * 7)?
            .set_default("cors.allowed_origins", vec!["http://localhost:3000"])?
            .set_default("websocket.max_message_size", 65536_i64)? // 64KB
            .set_default("websocket.max_frame_size", 16384_i64)? // 16KB
            .set_default("log.json", false)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__SERVER__PORT=5000 -> server.port = 5000
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("PORT").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("redis.url", std::env::var("REDIS_URL").ok())?
            .set_override_option("bus.kind", std::env::var("BUS_KIND").ok())?
            .set_override_option("instance.id", std::env::var("SERVER_ID").ok())?
            .set_override_option("jwt.secret", std::env::var("JWT_SECRET").ok())?
            .set_override_option(
                "cors.allowed_origins",
                std::env::var("CLIENT_URL").ok().map(|url| vec![url]),
            )?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| settings.validate().map(|_| settings))
    }

    /// Reject settings that would start an insecure or misrouted instance.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::Message(format!(
                "JWT secret must be at least {} characters for security. Current length: {}",
                MIN_JWT_SECRET_LENGTH,
                self.jwt.secret.len()
            )));
        }
        if self.instance.id.trim().is_empty() {
            return Err(ConfigError::Message("instance.id must not be empty".into()));
        }
        if self.bus.channel.is_empty() {
            return Err(ConfigError::Message("bus.channel must not be empty".into()));
        }
        Ok(())
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
