//! Redis pub/sub event bus.
//!
//! Publishing goes through a `ConnectionManager`, which reconnects on its own.
//! Each subscription holds a dedicated pub/sub connection in a background
//! task that re-subscribes after the connection drops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use redis::aio::{ConnectionManager, PubSub};
use redis::{AsyncCommands, Client};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::{BusError, BusHandler, EventBus, Result};
use crate::config::RedisSettings;

pub struct RedisEventBus {
    client: Client,
    publisher: ConnectionManager,
    reconnect_delay: Duration,
    listeners: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl RedisEventBus {
    /// Connect the publishing side. Fails if Redis is unreachable at startup.
    #[instrument(skip(settings), fields(url = %settings.url))]
    pub async fn connect(settings: &RedisSettings, reconnect_delay: Duration) -> Result<Self> {
        info!("Connecting to Redis bus...");
        let client =
            Client::open(settings.url.as_str()).map_err(|e| BusError::Connection(e.to_string()))?;
        let publisher = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| BusError::Connection(e.to_string()))?;
        info!("Redis bus connected");

        Ok(Self {
            client,
            publisher,
            reconnect_delay,
            listeners: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    async fn open_subscription(client: &Client, channel: &str) -> Result<PubSub> {
        let mut pubsub = client
            .get_async_pubsub()
            .await
            .map_err(|e| BusError::Subscribe(e.to_string()))?;
        pubsub
            .subscribe(channel)
            .await
            .map_err(|e| BusError::Subscribe(e.to_string()))?;
        Ok(pubsub)
    }

    async fn listen(
        client: Client,
        channel: String,
        handler: Arc<dyn BusHandler>,
        mut pubsub: PubSub,
        reconnect_delay: Duration,
    ) {
        loop {
            {
                let messages = pubsub.into_on_message();
                tokio::pin!(messages);
                while let Some(msg) = messages.next().await {
                    match msg.get_payload::<String>() {
                        Ok(payload) => handler.handle(&channel, &payload).await,
                        Err(e) => warn!(channel = %channel, error = %e, "Dropping non-text bus payload"),
                    }
                }
            }

            warn!(channel = %channel, "Bus subscription lost, reconnecting");
            pubsub = loop {
                tokio::time::sleep(reconnect_delay).await;
                match Self::open_subscription(&client, &channel).await {
                    Ok(pubsub) => {
                        info!(channel = %channel, "Bus subscription restored");
                        break pubsub;
                    }
                    Err(e) => error!(channel = %channel, error = %e, "Bus reconnect failed"),
                }
            };
        }
    }
}

#[async_trait]
impl EventBus for RedisEventBus {
    async fn publish(&self, channel: &str, payload: String) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BusError::Closed);
        }
        let mut conn = self.publisher.clone();
        conn.publish::<_, _, ()>(channel, payload)
            .await
            .map_err(|e| BusError::Publish(e.to_string()))
    }

    #[instrument(skip(self, handler))]
    async fn subscribe(&self, channel: &str, handler: Arc<dyn BusHandler>) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BusError::Closed);
        }

        let pubsub = Self::open_subscription(&self.client, channel).await?;
        info!("Subscribed to bus channel");

        let listener = tokio::spawn(Self::listen(
            self.client.clone(),
            channel.to_string(),
            handler,
            pubsub,
            self.reconnect_delay,
        ));
        self.listeners.lock().push(listener);
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        for listener in self.listeners.lock().drain(..) {
            listener.abort();
        }
        debug!("Redis bus closed");
    }
}
