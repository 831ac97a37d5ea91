//! Fan-out Engine
//!
//! Delivers stored messages to local room members and relays them to sibling
//! instances over the shared bus. Envelopes carry the publishing instance id;
//! an instance never re-delivers its own envelopes, and each message id is
//! delivered locally at most once.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::gateway::Gateway;
use super::messages::ServerEvent;
use crate::application::services::{MessageDistributor, MessageDto};
use crate::infrastructure::bus::{self, BusHandler, EventBus};
use crate::infrastructure::metrics;

/// Event kinds carried over the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusEvent {
    NewMessage { data: MessageDto },
}

impl BusEvent {
    fn message_id(&self) -> Uuid {
        match self {
            BusEvent::NewMessage { data } => data.id,
        }
    }
}

/// Envelope published on the shared bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributedEvent {
    #[serde(flatten)]
    pub event: BusEvent,
    pub origin_instance_id: String,
}

/// Bounded memory of message ids already delivered on this instance.
struct RecentIds {
    order: VecDeque<Uuid>,
    seen: HashSet<Uuid>,
    capacity: usize,
}

impl RecentIds {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns false if `id` was already recorded.
    fn insert(&mut self, id: Uuid) -> bool {
        if !self.seen.insert(id) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }
}

/// Outcome of receiving one envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relay {
    Delivered(usize),
    OwnOrigin,
    Duplicate,
}

pub struct FanoutEngine {
    instance_id: String,
    channel: String,
    gateway: Arc<Gateway>,
    bus: Arc<dyn EventBus>,
    recent: Mutex<RecentIds>,
}

impl FanoutEngine {
    pub fn new(
        instance_id: impl Into<String>,
        channel: impl Into<String>,
        gateway: Arc<Gateway>,
        bus: Arc<dyn EventBus>,
        dedup_window: usize,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            channel: channel.into(),
            gateway,
            bus,
            recent: Mutex::new(RecentIds::new(dedup_window)),
        }
    }

    /// Subscribe to the shared channel. Envelopes published after this
    /// returns reach local sessions.
    pub async fn start(self: &Arc<Self>) -> bus::Result<()> {
        let handler: Arc<dyn BusHandler> = Arc::clone(self) as Arc<dyn BusHandler>;
        self.bus.subscribe(&self.channel, handler).await?;
        debug!(channel = %self.channel, instance_id = %self.instance_id, "Fan-out subscribed");
        Ok(())
    }

    /// Apply loop and duplicate suppression, then deliver locally.
    pub fn receive(&self, envelope: DistributedEvent) -> Relay {
        if envelope.origin_instance_id == self.instance_id {
            metrics::record_suppressed("own_origin");
            return Relay::OwnOrigin;
        }

        if !self.recent.lock().insert(envelope.event.message_id()) {
            metrics::record_suppressed("duplicate");
            return Relay::Duplicate;
        }

        let delivered = self.deliver(envelope.event);
        metrics::record_deliveries("relay", delivered);
        Relay::Delivered(delivered)
    }

    fn deliver(&self, event: BusEvent) -> usize {
        match event {
            BusEvent::NewMessage { data } => {
                let room = data.conversation_id;
                self.gateway
                    .broadcast_to_room(room, &ServerEvent::NewMessage { data }, None)
            }
        }
    }
}

#[async_trait]
impl MessageDistributor for FanoutEngine {
    /// Local delivery happens first and does not depend on the bus.
    #[instrument(skip(self, message), fields(message_id = %message.id))]
    async fn distribute(&self, message: &MessageDto) {
        if self.recent.lock().insert(message.id) {
            let delivered = self.deliver(BusEvent::NewMessage {
                data: message.clone(),
            });
            metrics::record_deliveries("direct", delivered);
        }

        let envelope = DistributedEvent {
            event: BusEvent::NewMessage {
                data: message.clone(),
            },
            origin_instance_id: self.instance_id.clone(),
        };

        let payload = match serde_json::to_string(&envelope) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Envelope encoding failed");
                metrics::record_bus_publish(false);
                return;
            }
        };

        match self.bus.publish(&self.channel, payload).await {
            Ok(()) => metrics::record_bus_publish(true),
            Err(e) => {
                warn!(error = %e, "Bus publish failed, message delivered locally only");
                metrics::record_bus_publish(false);
            }
        }
    }
}

#[async_trait]
impl BusHandler for FanoutEngine {
    async fn handle(&self, channel: &str, payload: &str) {
        let envelope: DistributedEvent = match serde_json::from_str(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(channel, error = %e, "Dropping malformed envelope");
                metrics::record_suppressed("malformed");
                return;
            }
        };

        let outcome = self.receive(envelope);
        debug!(channel, ?outcome, "Envelope handled");
    }
}
