//! Publish/subscribe contract for sharing observations between gateway instances.
//!
//! The engine only needs `publish(topic, bytes)` and `subscribe(topic) -> stream of bytes`.
//! Delivery is best-effort and at-least-once: implementations may drop, duplicate or reorder
//! messages, and subscribers must tolerate all three.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use futures::stream::{self, BoxStream, StreamExt};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{trace, warn};

/// Default per-topic buffer of [`LocalBus`].
pub const DEFAULT_LOCAL_BUS_CAPACITY: usize = 1024;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("publish to topic {topic} failed: {reason}")]
    Publish { topic: String, reason: String },

    #[error("subscribe to topic {topic} failed: {reason}")]
    Subscribe { topic: String, reason: String },
}

/// Topic-based publish/subscribe transport.
#[async_trait]
pub trait ObservationBus: Send + Sync {
    /// Publishes one message. Success means the transport accepted it, not that anyone
    /// received it.
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), BusError>;

    /// Subscribes to a topic. The stream ends when the transport closes the subscription.
    async fn subscribe(&self, topic: &str) -> Result<BoxStream<'static, Bytes>, BusError>;
}

/// In-process bus backed by one `tokio::sync::broadcast` channel per topic.
///
/// Serves single-instance deployments and lets several engine instances share observations
/// inside one process. Subscribers that fall behind by more than the channel capacity lose
/// the oldest messages.
#[derive(Debug)]
pub struct LocalBus {
    topics: DashMap<String, broadcast::Sender<Bytes>>,
    capacity: usize,
}

impl LocalBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { topics: DashMap::new(), capacity: capacity.max(1) }
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<Bytes> {
        if let Some(sender) = self.topics.get(topic) {
            return sender.clone();
        }
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Number of live subscriptions on `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, |sender| sender.receiver_count())
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new(DEFAULT_LOCAL_BUS_CAPACITY)
    }
}

#[async_trait]
impl ObservationBus for LocalBus {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), BusError> {
        if self.sender(topic).send(payload).is_err() {
            trace!(topic, "no subscribers, observation not delivered");
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<BoxStream<'static, Bytes>, BusError> {
        let receiver = self.sender(topic).subscribe();
        let topic = topic.to_string();

        let stream = stream::unfold((receiver, topic), |(mut receiver, topic)| async move {
            loop {
                match receiver.recv().await {
                    Ok(payload) => return Some((payload, (receiver, topic))),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(topic = %topic, skipped, "observation subscriber lagged");
                        crate::metrics::record_messages_lagged(&topic, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        Ok(stream.boxed())
    }
}
