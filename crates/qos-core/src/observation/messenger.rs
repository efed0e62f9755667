use super::{
    bus::{BusError, ObservationBus},
    wire::{ObservationError, QosObservations},
};
use crate::{
    config::MessengerConfig, errors::QosError, qos::ServiceQosRegistry, types::ServiceId,
};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Default topic prefix; the topic of service `eth` is `qos.observations.eth`.
pub const DEFAULT_TOPIC_PREFIX: &str = "qos.observations";

#[derive(Error, Debug)]
pub enum MessengerError {
    #[error(transparent)]
    Observation(#[from] ObservationError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("no service registered as {0}")]
    UnknownService(String),

    #[error("observation rejected: {0}")]
    Rejected(#[from] QosError),
}

impl MessengerError {
    /// Static label for the drop-reason metric.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Observation(ObservationError::Decode(_)) => "decode",
            Self::Observation(_) => "encode",
            Self::Bus(_) => "bus",
            Self::UnknownService(_) => "unknown_service",
            Self::Rejected(_) => "rejected",
        }
    }
}

/// Shares observations between gateway instances over an [`ObservationBus`].
///
/// Publishing serializes a [`QosObservations`] onto its service's topic. The listener
/// subscribes to the topics of every registered service and replays each message through
/// [`ServiceQos::apply_observations`](crate::qos::ServiceQos::apply_observations). Messages
/// that cannot be decoded, name an unregistered service or are rejected are dropped with a
/// warning; they never stop the listener.
///
/// Delivery is at-least-once and unordered, and duplicates are applied as received.
///
/// Every published message carries the messenger's instance ID as its `origin`. Callers apply
/// their own journals locally before publishing, so the listener skips messages stamped with
/// its own ID; an instance subscribed to its own topics never counts an observation twice.
pub struct Messenger {
    bus: Arc<dyn ObservationBus>,
    registry: Arc<ServiceQosRegistry>,
    topic_prefix: String,
    instance_id: String,
}

impl Messenger {
    /// Creates a messenger with a random instance ID.
    #[must_use]
    pub fn new(
        bus: Arc<dyn ObservationBus>,
        registry: Arc<ServiceQosRegistry>,
        topic_prefix: impl Into<String>,
    ) -> Self {
        Self {
            bus,
            registry,
            topic_prefix: topic_prefix.into(),
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Builds the configured messenger, or `None` when sharing is disabled.
    #[must_use]
    pub fn from_config(
        bus: Arc<dyn ObservationBus>,
        registry: Arc<ServiceQosRegistry>,
        config: &MessengerConfig,
    ) -> Option<Self> {
        if !config.enabled {
            info!("observation sharing disabled");
            return None;
        }
        let messenger = Self::new(bus, registry, config.topic_prefix.clone());
        Some(match &config.instance_id {
            Some(instance_id) => messenger.with_instance_id(instance_id.clone()),
            None => messenger,
        })
    }

    /// Replaces the generated instance ID, e.g. with a stable host name.
    #[must_use]
    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = instance_id.into();
        self
    }

    #[must_use]
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    #[must_use]
    pub fn topic_for(&self, service_id: &ServiceId) -> String {
        format!("{}.{}", self.topic_prefix, service_id)
    }

    /// Serializes and publishes observations on their service's topic.
    ///
    /// # Errors
    ///
    /// Returns [`MessengerError`] if encoding fails or the bus refuses the message.
    /// Messages relayed from another instance keep their origin.
    pub async fn publish(&self, observations: &QosObservations) -> Result<(), MessengerError> {
        let payload = if observations.origin.is_some() {
            observations.to_bytes()?
        } else {
            let mut stamped = observations.clone();
            stamped.origin = Some(self.instance_id.clone());
            stamped.to_bytes()?
        };
        let topic = self.topic_for(&ServiceId::new(&observations.service_name));
        self.bus.publish(&topic, payload).await?;
        debug!(
            topic = %topic,
            endpoints = observations.endpoint_observations.len(),
            "published observations"
        );
        Ok(())
    }

    /// Decodes one message and applies it to the service it names.
    ///
    /// Returns `None` for a message this messenger published itself, which is not applied.
    ///
    /// # Errors
    ///
    /// Returns [`MessengerError`] if the message is undecodable, names an unregistered
    /// service, or is rejected by that service.
    pub fn handle_message(&self, payload: &[u8]) -> Result<Option<ServiceId>, MessengerError> {
        let observations = QosObservations::from_bytes(payload)?;
        if observations.origin.as_deref() == Some(self.instance_id.as_str()) {
            trace!(service = %observations.service_name, "skipping own observations");
            return Ok(None);
        }
        let qos = self
            .registry
            .get(&observations.service_name)
            .ok_or_else(|| MessengerError::UnknownService(observations.service_name.clone()))?;

        qos.apply_observations(&observations)?;
        Ok(Some(qos.service_id().clone()))
    }

    /// Subscribes to every registered service's topic and spawns the listener.
    ///
    /// Services registered afterwards are not subscribed. The listener processes messages one
    /// at a time and stops on shutdown or when every subscription has ended.
    ///
    /// # Errors
    ///
    /// Returns [`MessengerError::Bus`] if any subscription fails.
    pub async fn start(
        self: Arc<Self>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<JoinHandle<()>, MessengerError> {
        let mut subscriptions = Vec::new();
        for service_id in self.registry.service_ids() {
            let topic = self.topic_for(&service_id);
            subscriptions.push(self.bus.subscribe(&topic).await?);
            debug!(topic = %topic, "subscribed to observations");
        }
        info!(topics = subscriptions.len(), "observation listener started");

        let mut messages = stream::select_all(subscriptions);

        Ok(tokio::spawn(async move {
            loop {
                tokio::select! {
                    message = messages.next() => {
                        let Some(payload) = message else {
                            info!("all observation subscriptions closed");
                            break;
                        };
                        match self.handle_message(&payload) {
                            Ok(Some(service_id)) => {
                                debug!(service = %service_id, "applied remote observations");
                            }
                            Ok(None) => {}
                            Err(e) => {
                                warn!(
                                    error = %e,
                                    reason = e.reason(),
                                    "dropped observation message"
                                );
                                crate::metrics::record_message_dropped(e.reason());
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("observation listener shutting down");
                        break;
                    }
                }
            }
        }))
    }
}
