//! Per-endpoint result storage with bounded growth.
//!
//! Each [`Endpoint`] keeps the latest [`EndpointQueryResult`] per JSON-RPC method and an
//! optional [`Sanction`]. The [`EndpointStore`] caps the number of tracked endpoints and
//! evicts the least-recently-updated one when a new address arrives at capacity; endpoints
//! that stop reporting are removed by a TTL sweep.

use crate::{journal::EndpointQueryResult, types::EndpointAddr};
use ahash::AHashMap;
use std::{collections::HashMap, time::Duration};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Time-bounded exclusion of an endpoint from selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanction {
    pub reason: String,
    pub expires_at: Instant,
}

impl Sanction {
    #[must_use]
    pub fn new(reason: impl Into<String>, duration: Duration) -> Self {
        Self { reason: reason.into(), expires_at: Instant::now() + duration }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        Instant::now() < self.expires_at
    }

    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at.checked_duration_since(Instant::now()).filter(|d| !d.is_zero())
    }
}

/// Latest known results for one backend endpoint.
#[derive(Debug, Clone)]
pub struct Endpoint {
    addr: EndpointAddr,
    results: AHashMap<String, EndpointQueryResult>,
    sanction: Option<Sanction>,
    last_updated: Instant,
}

impl Endpoint {
    #[must_use]
    pub fn new(addr: EndpointAddr) -> Self {
        Self { addr, results: AHashMap::new(), sanction: None, last_updated: Instant::now() }
    }

    #[inline]
    #[must_use]
    pub fn addr(&self) -> &EndpointAddr {
        &self.addr
    }

    /// Latest result recorded for `method`.
    #[must_use]
    pub fn result(&self, method: &str) -> Option<&EndpointQueryResult> {
        self.results.get(method)
    }

    /// String attribute `key` of the latest `method` result.
    #[must_use]
    pub fn get_str_result(&self, method: &str, key: &str) -> Option<&str> {
        self.results.get(method).and_then(|r| r.get_str_value(key))
    }

    /// Integer attribute `key` of the latest `method` result.
    #[must_use]
    pub fn get_int_result(&self, method: &str, key: &str) -> Option<i64> {
        self.results.get(method).and_then(|r| r.get_int_value(key))
    }

    /// Methods with a recorded result.
    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.results.keys().map(String::as_str)
    }

    /// Sanction currently in force, ignoring expired ones.
    #[must_use]
    pub fn active_sanction(&self) -> Option<&Sanction> {
        self.sanction.as_ref().filter(|s| s.is_active())
    }

    #[must_use]
    pub fn last_updated(&self) -> Instant {
        self.last_updated
    }

    /// Merges a batch of results, one slot per method, last write wins.
    ///
    /// Results without a method are skipped: a malformed result must never overwrite
    /// another method's entry. Returns the number of results applied.
    pub fn apply_query_results<'a>(
        &mut self,
        results: impl IntoIterator<Item = &'a EndpointQueryResult>,
    ) -> usize {
        let mut applied = 0;
        for result in results {
            if result.method().is_empty() {
                warn!(
                    endpoint = %self.addr,
                    request_id = %result.request_id(),
                    "skipping endpoint result without method"
                );
                continue;
            }
            self.results.insert(result.method().to_string(), result.clone());
            applied += 1;
        }

        if applied > 0 {
            self.last_updated = Instant::now();
        }
        applied
    }

    pub(crate) fn set_sanction(&mut self, sanction: Sanction) {
        self.sanction = Some(sanction);
    }
}

/// Keyed collection of all known endpoints of one service.
#[derive(Debug)]
pub struct EndpointStore {
    endpoints: HashMap<EndpointAddr, Endpoint>,
    max_endpoints: usize,
}

impl EndpointStore {
    /// Creates a store holding at most `max_endpoints` endpoints (minimum one).
    #[must_use]
    pub fn new(max_endpoints: usize) -> Self {
        Self { endpoints: HashMap::new(), max_endpoints: max_endpoints.max(1) }
    }

    #[must_use]
    pub fn get(&self, addr: &EndpointAddr) -> Option<&Endpoint> {
        self.endpoints.get(addr)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.max_endpoints
    }

    /// Returns the endpoint for `addr`, creating it if absent.
    ///
    /// When a new address arrives at capacity the least-recently-updated endpoint is
    /// evicted first and returned alongside.
    pub fn get_or_insert(&mut self, addr: &EndpointAddr) -> (&mut Endpoint, Option<EndpointAddr>) {
        let mut evicted = None;
        if !self.endpoints.contains_key(addr) && self.endpoints.len() >= self.max_endpoints {
            // O(n) scan; stores hold at most a few thousand endpoints.
            evicted = self
                .endpoints
                .values()
                .min_by_key(|e| e.last_updated)
                .map(|e| e.addr.clone());
            if let Some(ref oldest) = evicted {
                self.endpoints.remove(oldest);
                debug!(
                    evicted = %oldest,
                    capacity = self.max_endpoints,
                    "evicted endpoint at capacity"
                );
            }
        }

        let endpoint =
            self.endpoints.entry(addr.clone()).or_insert_with(|| Endpoint::new(addr.clone()));
        (endpoint, evicted)
    }

    pub(crate) fn get_mut(&mut self, addr: &EndpointAddr) -> Option<&mut Endpoint> {
        self.endpoints.get_mut(addr)
    }

    /// Removes endpoints not updated within `ttl`, returning their addresses.
    pub fn evict_stale(&mut self, ttl: Duration) -> Vec<EndpointAddr> {
        let now = Instant::now();
        let stale: Vec<EndpointAddr> = self
            .endpoints
            .values()
            .filter(|e| now.duration_since(e.last_updated) > ttl)
            .map(|e| e.addr.clone())
            .collect();

        for addr in &stale {
            self.endpoints.remove(addr);
        }
        stale
    }
}
