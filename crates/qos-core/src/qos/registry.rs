use super::ServiceQos;
use crate::{
    config::QosConfig,
    evm::{EvmConfig, EvmQosDefinition},
    types::ServiceId,
};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::info;

/// Registered [`ServiceQos`] instances, keyed by service ID.
///
/// Shared between the gateway, which routes each request to its service, and the
/// [`Messenger`](crate::observation::Messenger), which routes each received observation.
#[derive(Debug, Default)]
pub struct ServiceQosRegistry {
    services: DashMap<ServiceId, Arc<ServiceQos>>,
}

impl ServiceQosRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every configured service with the EVM strategy.
    #[must_use]
    pub fn from_config(config: &QosConfig) -> Self {
        let registry = Self::new();
        let evm = EvmConfig::from(&config.archival);
        for name in &config.services {
            registry.register(Arc::new(ServiceQos::new(
                ServiceId::new(name),
                EvmQosDefinition::build(evm.clone()),
                config.endpoint_store.max_endpoints,
            )));
        }
        registry
    }

    /// Starts one endpoint sweeper per registered service, using the configured interval and
    /// TTL.
    #[must_use]
    pub fn start_endpoint_sweepers(
        &self,
        config: &QosConfig,
        shutdown_tx: &broadcast::Sender<()>,
    ) -> Vec<JoinHandle<()>> {
        self.services
            .iter()
            .map(|entry| {
                entry.value().start_endpoint_sweeper(
                    config.sweep_interval(),
                    config.endpoint_ttl(),
                    shutdown_tx.subscribe(),
                )
            })
            .collect()
    }

    /// Registers a service, returning the instance it replaced, if any.
    pub fn register(&self, qos: Arc<ServiceQos>) -> Option<Arc<ServiceQos>> {
        let service_id = qos.service_id().clone();
        info!(service = %service_id, "registered service");
        self.services.insert(service_id, qos)
    }

    pub fn remove(&self, service_id: &str) -> Option<Arc<ServiceQos>> {
        self.services.remove(service_id).map(|(_, qos)| qos)
    }

    #[must_use]
    pub fn get(&self, service_id: &str) -> Option<Arc<ServiceQos>> {
        self.services.get(service_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Registered service IDs in sorted order.
    #[must_use]
    pub fn service_ids(&self) -> Vec<ServiceId> {
        let mut ids: Vec<ServiceId> = self.services.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
