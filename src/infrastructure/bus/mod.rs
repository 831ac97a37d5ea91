//! Event Bus
//!
//! Shared publish/subscribe transport between server instances.
//!
//! The bus moves opaque text payloads on named channels; envelope encoding and
//! loop suppression belong to the fan-out engine. Every instance is a symmetric
//! publisher and subscriber, and a subscriber also receives what its own
//! instance published.
//!
//! Implementations:
//! - `RedisEventBus`: Redis pub/sub, shared by every instance
//! - `InMemoryEventBus`: tokio broadcast channel for a standalone instance and tests

mod memory;
mod redis_bus;

pub use memory::InMemoryEventBus;
pub use redis_bus::RedisEventBus;

use std::sync::Arc;

use async_trait::async_trait;

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// Errors that can occur during bus operations.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    #[error("Bus closed")]
    Closed,
}

/// Receives every payload arriving on a subscribed channel.
#[async_trait]
pub trait BusHandler: Send + Sync {
    async fn handle(&self, channel: &str, payload: &str);
}

/// Publish/subscribe transport with an explicit lifecycle: built connected,
/// torn down with `close`.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish one payload. Not retried.
    async fn publish(&self, channel: &str, payload: String) -> Result<()>;

    /// Start a background listener that feeds every payload on `channel` to
    /// `handler`. Payloads published after this returns are observed.
    async fn subscribe(&self, channel: &str, handler: Arc<dyn BusHandler>) -> Result<()>;

    /// Stop all listeners started by this handle.
    async fn close(&self);
}
