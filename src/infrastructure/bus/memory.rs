//! In-memory channel-based event bus.
//!
//! Uses a tokio broadcast channel for pub/sub within one process. Handles
//! created with [`InMemoryEventBus::linked`] share the channel, so several
//! gateway instances in one process behave like instances sharing Redis.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{BusError, BusHandler, EventBus, Result};

/// Channel capacity for broadcast.
const CHANNEL_CAPACITY: usize = 1024;

pub struct InMemoryEventBus {
    sender: broadcast::Sender<(String, String)>,
    listeners: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        info!("In-memory event bus initialized");
        Self::with_sender(sender)
    }

    /// Another handle on the same channel, with its own listeners and lifecycle.
    pub fn linked(&self) -> Self {
        Self::with_sender(self.sender.clone())
    }

    fn with_sender(sender: broadcast::Sender<(String, String)>) -> Self {
        Self {
            sender,
            listeners: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, channel: &str, payload: String) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BusError::Closed);
        }
        // No receivers just means no instance is listening yet.
        if self.sender.send((channel.to_string(), payload)).is_err() {
            debug!(channel, "Published with no subscribers");
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str, handler: Arc<dyn BusHandler>) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BusError::Closed);
        }

        let mut receiver = self.sender.subscribe();
        let channel = channel.to_string();

        let listener = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok((published_on, payload)) => {
                        if published_on == channel {
                            handler.handle(&published_on, &payload).await;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(channel = %channel, skipped, "Bus subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        self.listeners.lock().push(listener);
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        for listener in self.listeners.lock().drain(..) {
            listener.abort();
        }
    }
}
