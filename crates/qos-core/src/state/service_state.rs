//! Per-service quality state.
//!
//! `ServiceState` is the single source of truth for one service's quality view and the only
//! shared mutable data in the engine.
//!
//! # Thread Safety
//!
//! A single `parking_lot::RwLock` guards parameters and endpoints together. Reads
//! (parameter lookups, probe construction, endpoint selection) share the lock; every mutation
//! takes it exclusively for the in-memory merge only. No I/O happens under the lock, so
//! writers never wait on slow network calls.
//!
//! Reads return owned copies (or snapshots of endpoints), so callers need no further
//! synchronization once a read returns.

use super::{
    endpoint::{Endpoint, EndpointStore, Sanction},
    parameter::{ConsensusMap, ParameterUpdates, StateParameter},
};
use crate::{
    journal::EndpointQueryResult,
    types::{EndpointAddr, ServiceId},
};
use parking_lot::{RwLock, RwLockReadGuard};
use std::{collections::HashMap, time::Duration};
use tracing::{debug, trace, warn};

/// Parameters and sanctions staged by one state update, applied in a single write.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub parameters: ParameterUpdates,
    pub sanctions: Vec<(EndpointAddr, Sanction)>,
}

/// Summary of one merge through the write path.
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    /// Endpoints touched by the merged results, in first-touch order.
    pub updated_endpoints: Vec<EndpointAddr>,
    /// Endpoints evicted to make room for new addresses.
    pub evicted_endpoints: Vec<EndpointAddr>,
    /// Number of parameters replaced by the state updater.
    pub parameters_updated: usize,
    /// Number of sanctions applied by the state updater.
    pub sanctions_applied: usize,
}

/// Lock-protected contents of a [`ServiceState`].
///
/// Strategy contexts borrow this under the read lock; every accessor is a pure read.
#[derive(Debug)]
pub struct StateData {
    parameters: HashMap<String, StateParameter>,
    endpoints: EndpointStore,
}

impl StateData {
    fn new(max_endpoints: usize) -> Self {
        Self { parameters: HashMap::new(), endpoints: EndpointStore::new(max_endpoints) }
    }

    #[must_use]
    pub fn get_param(&self, name: &str) -> Option<&StateParameter> {
        self.parameters.get(name)
    }

    #[must_use]
    pub fn get_str_param(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).and_then(StateParameter::as_str)
    }

    #[must_use]
    pub fn get_int_param(&self, name: &str) -> Option<i64> {
        self.parameters.get(name).and_then(StateParameter::as_int)
    }

    #[must_use]
    pub fn get_consensus_param(&self, name: &str) -> Option<&ConsensusMap> {
        self.parameters.get(name).and_then(StateParameter::as_consensus)
    }

    #[must_use]
    pub fn endpoint(&self, addr: &EndpointAddr) -> Option<&Endpoint> {
        self.endpoints.get(addr)
    }

    #[must_use]
    pub fn endpoints(&self) -> &EndpointStore {
        &self.endpoints
    }

    /// Merges each result into its source endpoint, creating endpoints as needed.
    ///
    /// Returns the touched addresses in first-touch order and any addresses evicted to make
    /// room.
    fn update_stored_endpoints(
        &mut self,
        results: &[EndpointQueryResult],
    ) -> (Vec<EndpointAddr>, Vec<EndpointAddr>) {
        let mut touched: Vec<EndpointAddr> = Vec::new();
        let mut evicted: Vec<EndpointAddr> = Vec::new();

        for result in results {
            if result.method().is_empty() {
                warn!(
                    endpoint = %result.endpoint_addr(),
                    request_id = %result.request_id(),
                    "skipping endpoint result without method"
                );
                continue;
            }
            let (endpoint, evicted_addr) = self.endpoints.get_or_insert(result.endpoint_addr());
            if endpoint.apply_query_results([result]) > 0 &&
                !touched.contains(result.endpoint_addr())
            {
                touched.push(result.endpoint_addr().clone());
            }
            evicted.extend(evicted_addr);
        }

        // An endpoint touched early in the batch may itself be evicted later at capacity.
        touched.retain(|addr| self.endpoints.get(addr).is_some());
        (touched, evicted)
    }

    fn update_parameters(&mut self, updates: &ParameterUpdates) {
        for (name, value) in updates.iter() {
            self.parameters.insert(name.clone(), value.clone());
        }
    }

    fn apply_sanctions(&mut self, sanctions: Vec<(EndpointAddr, Sanction)>) -> usize {
        let mut applied = 0;
        for (addr, sanction) in sanctions {
            if let Some(endpoint) = self.endpoints.get_mut(&addr) {
                debug!(endpoint = %addr, reason = %sanction.reason, "endpoint sanctioned");
                endpoint.set_sanction(sanction);
                applied += 1;
            }
        }
        applied
    }

    fn snapshots(&self, addrs: &[EndpointAddr]) -> Vec<Endpoint> {
        addrs.iter().filter_map(|addr| self.endpoints.get(addr).cloned()).collect()
    }
}

/// Quality state of one blockchain service.
#[derive(Debug)]
pub struct ServiceState {
    service_id: ServiceId,
    data: RwLock<StateData>,
}

impl ServiceState {
    /// Creates an empty state tracking at most `max_endpoints` endpoints.
    #[must_use]
    pub fn new(service_id: ServiceId, max_endpoints: usize) -> Self {
        Self { service_id, data: RwLock::new(StateData::new(max_endpoints)) }
    }

    #[must_use]
    pub fn service_id(&self) -> &ServiceId {
        &self.service_id
    }

    /// Shared read access to the whole state for strategy contexts.
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, StateData> {
        self.data.read()
    }

    #[must_use]
    pub fn get_str_param(&self, name: &str) -> Option<String> {
        self.data.read().get_str_param(name).map(str::to_string)
    }

    #[must_use]
    pub fn get_int_param(&self, name: &str) -> Option<i64> {
        self.data.read().get_int_param(name)
    }

    /// Returns an independent copy of a consensus map.
    #[must_use]
    pub fn get_consensus_param(&self, name: &str) -> Option<ConsensusMap> {
        self.data.read().get_consensus_param(name).cloned()
    }

    /// Snapshot of one endpoint.
    #[must_use]
    pub fn endpoint(&self, addr: &EndpointAddr) -> Option<Endpoint> {
        self.data.read().endpoint(addr).cloned()
    }

    #[must_use]
    pub fn endpoint_count(&self) -> usize {
        self.data.read().endpoints.len()
    }

    /// Merges results into the endpoint store and returns snapshots of the touched endpoints.
    pub fn update_stored_endpoints(&self, results: &[EndpointQueryResult]) -> Vec<Endpoint> {
        let mut data = self.data.write();
        let (touched, evicted) = data.update_stored_endpoints(results);
        if !evicted.is_empty() {
            crate::metrics::record_endpoints_evicted(&self.service_id, evicted.len());
        }
        data.snapshots(&touched)
    }

    /// Replaces each named parameter wholesale with the value in `updates`.
    pub fn update_parameters(&self, updates: &ParameterUpdates) {
        if updates.is_empty() {
            return;
        }
        self.data.write().update_parameters(updates);
        trace!(service = %self.service_id, count = updates.len(), "parameters updated");
    }

    /// Runs one complete merge under a single exclusive lock.
    ///
    /// Results are merged into the endpoint store, then `update` computes the staged state
    /// update from the merged view and the touched endpoints, and the update is applied before
    /// the lock is released. Concurrent merges therefore never interleave their
    /// read-modify-write of consensus parameters.
    pub fn merge<F>(&self, results: &[EndpointQueryResult], update: F) -> MergeOutcome
    where
        F: FnOnce(&StateData, &[Endpoint]) -> StateUpdate,
    {
        let mut data = self.data.write();

        let (touched, evicted) = data.update_stored_endpoints(results);
        let snapshots = data.snapshots(&touched);

        let StateUpdate { parameters, sanctions } = update(&*data, &snapshots);
        data.update_parameters(&parameters);
        let sanctions_applied = data.apply_sanctions(sanctions);
        drop(data);

        if !evicted.is_empty() {
            crate::metrics::record_endpoints_evicted(&self.service_id, evicted.len());
        }

        MergeOutcome {
            updated_endpoints: touched,
            evicted_endpoints: evicted,
            parameters_updated: parameters.len(),
            sanctions_applied,
        }
    }

    /// Removes endpoints that have not been updated within `ttl`.
    pub fn evict_stale_endpoints(&self, ttl: Duration) -> Vec<EndpointAddr> {
        let evicted = self.data.write().endpoints.evict_stale(ttl);
        if !evicted.is_empty() {
            debug!(service = %self.service_id, count = evicted.len(), "evicted stale endpoints");
            crate::metrics::record_endpoints_evicted(&self.service_id, evicted.len());
        }
        evicted
    }
}
