use super::request::{InboundRequest, RequestContext};
use crate::{
    context::{EndpointQualityChecksContext, EndpointSelectionContext, StateUpdateContext},
    definition::QosDefinition,
    errors::{QosError, RequestErrorKind},
    journal::RequestJournal,
    observation::{ObservationError, QosObservations},
    state::{MergeOutcome, ServiceState},
    types::{EndpointAddr, JsonRpcRequest, ServiceId},
};
use std::{sync::Arc, time::Duration};
use tokio::{sync::broadcast, task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// QoS orchestrator of one blockchain service.
///
/// Binds the service's [`ServiceState`] to its [`QosDefinition`] and exposes the lifecycle the
/// gateway drives for every request:
///
/// ```text
/// parse_http_request ─► dispatch (gateway) ─► apply_observations ─► state merged
///                                                                      │
///        get_required_quality_checks / select_endpoint ◄───────────────┘
/// ```
///
/// Local journals and observations received from other instances enter through the same
/// [`apply_journal`](Self::apply_journal) path and are indistinguishable once applied.
#[derive(Debug)]
pub struct ServiceQos {
    state: ServiceState,
    definition: QosDefinition,
}

impl ServiceQos {
    #[must_use]
    pub fn new(service_id: ServiceId, definition: QosDefinition, max_endpoints: usize) -> Self {
        Self { state: ServiceState::new(service_id, max_endpoints), definition }
    }

    #[must_use]
    pub fn service_id(&self) -> &ServiceId {
        self.state.service_id()
    }

    #[must_use]
    pub fn state(&self) -> &ServiceState {
        &self.state
    }

    #[must_use]
    pub fn definition(&self) -> &QosDefinition {
        &self.definition
    }

    /// Parses an inbound HTTP request into a request context.
    ///
    /// Never fails: a request that cannot be served yields a context whose
    /// [`should_continue`](RequestContext::should_continue) is `false` and whose client
    /// response is the structured JSON-RPC error.
    pub fn parse_http_request(self: &Arc<Self>, req: &impl InboundRequest) -> RequestContext {
        let body = match req.read_body() {
            Ok(body) => body,
            Err(e) => {
                debug!(service = %self.service_id(), error = %e, "request body read failed");
                return RequestContext::failed(
                    Arc::clone(self),
                    None,
                    RequestErrorKind::BodyReadFailed,
                    e.to_string(),
                );
            }
        };

        let value: serde_json::Value = match serde_json::from_slice(&body) {
            Ok(value) => value,
            Err(e) => {
                debug!(service = %self.service_id(), error = %e, "request is not valid JSON");
                return RequestContext::failed(
                    Arc::clone(self),
                    None,
                    RequestErrorKind::ParseError,
                    format!("parse error: {e}"),
                );
            }
        };

        if !value.is_object() {
            return RequestContext::failed(
                Arc::clone(self),
                None,
                RequestErrorKind::InvalidRequest,
                "request must be a single JSON-RPC object",
            );
        }

        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                return RequestContext::failed(
                    Arc::clone(self),
                    None,
                    RequestErrorKind::InvalidRequest,
                    format!("invalid request: {e}"),
                );
            }
        };

        if let Err(e) = request.validate() {
            debug!(
                service = %self.service_id(),
                method = %request.method,
                error = %e,
                "request failed validation"
            );
            return RequestContext::failed(Arc::clone(self), Some(request), e.kind(), e.to_string());
        }

        trace!(service = %self.service_id(), method = %request.method, "request parsed");
        RequestContext::new(Arc::clone(self), request)
    }

    /// Ingests an observation message, local or received from another instance.
    ///
    /// All-or-nothing: on error the state is left untouched.
    ///
    /// # Errors
    ///
    /// - [`QosError::ServiceMismatch`] if the message declares another service
    /// - [`QosError::InconsistentJournal`] if it carries endpoint results alongside a request
    ///   error, or neither a request nor a request error
    pub fn apply_observations(&self, observations: &QosObservations) -> Result<(), QosError> {
        self.check_service(&observations.service_name)?;

        let journal = RequestJournal::try_from(observations.clone()).map_err(|e| match e {
            ObservationError::Journal(e) => QosError::InconsistentJournal(e),
            other => QosError::Observation(other),
        });
        let journal = match journal {
            Ok(journal) => journal,
            Err(e) => {
                warn!(service = %self.service_id(), error = %e, "rejected observation");
                crate::metrics::record_observation_rejected(self.service_id(), "inconsistent");
                return Err(e);
            }
        };

        self.apply_journal(&journal)
    }

    /// Merges a journal's endpoint results into the state and runs the state updater.
    ///
    /// # Errors
    ///
    /// Same as [`apply_observations`](Self::apply_observations).
    pub fn apply_journal(&self, journal: &RequestJournal) -> Result<(), QosError> {
        self.check_service(journal.service_id().as_str())?;

        if let Err(e) = journal.check_consistency() {
            warn!(service = %self.service_id(), error = %e, "rejected inconsistent journal");
            crate::metrics::record_observation_rejected(self.service_id(), "inconsistent");
            return Err(e.into());
        }

        if let Some(error) = journal.request_error() {
            trace!(
                service = %self.service_id(),
                kind = error.kind.as_str(),
                "request failed before dispatch, nothing to merge"
            );
            crate::metrics::record_observation_applied(self.service_id());
            return Ok(());
        }

        let results = journal.endpoint_results();
        let updater = self.definition.state_updater();
        let outcome = self.state.merge(results, |data, updated| {
            let mut ctx = StateUpdateContext::new(data, updated, results);
            updater.update_state(&mut ctx);
            ctx.into_update()
        });

        self.log_merge(&outcome);
        crate::metrics::record_observation_applied(self.service_id());
        crate::metrics::record_tracked_endpoints(self.service_id(), self.state.endpoint_count());
        Ok(())
    }

    /// Synthetic requests to send to `endpoint_addr`, each pinned to that endpoint.
    #[must_use]
    pub fn get_required_quality_checks(
        self: &Arc<Self>,
        endpoint_addr: &EndpointAddr,
    ) -> Vec<RequestContext> {
        let probes = {
            let data = self.state.read();
            let ctx = EndpointQualityChecksContext::new(&data, endpoint_addr);
            self.definition.probe_builder().build_probes(&ctx)
        };

        trace!(
            service = %self.service_id(),
            endpoint = %endpoint_addr,
            count = probes.len(),
            "quality checks built"
        );

        probes
            .into_iter()
            .map(|probe| RequestContext::probe(Arc::clone(self), probe, endpoint_addr.clone()))
            .collect()
    }

    /// Delegates to the service's endpoint selector.
    #[must_use]
    pub fn select_endpoint(
        &self,
        request: &JsonRpcRequest,
        candidates: &[EndpointAddr],
    ) -> Option<EndpointAddr> {
        let data = self.state.read();
        let ctx = EndpointSelectionContext::new(&data, request, candidates);
        let selected = self.definition.endpoint_selector().select_endpoint(&ctx);

        if selected.is_none() && !candidates.is_empty() {
            debug!(
                service = %self.service_id(),
                method = %request.method,
                candidates = candidates.len(),
                "no endpoint selected"
            );
        }
        selected
    }

    /// Spawns a task evicting endpoints not updated within `ttl`, every `interval`.
    ///
    /// Stops when `shutdown_rx` receives a value or its sender is dropped.
    #[must_use]
    pub fn start_endpoint_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        ttl: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let qos = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        qos.state.evict_stale_endpoints(ttl);
                        crate::metrics::record_tracked_endpoints(
                            qos.service_id(),
                            qos.state.endpoint_count(),
                        );
                    }
                    _ = shutdown_rx.recv() => {
                        info!(service = %qos.service_id(), "endpoint sweeper shutting down");
                        break;
                    }
                }
            }
        })
    }

    fn check_service(&self, declared: &str) -> Result<(), QosError> {
        if declared == self.service_id().as_str() {
            return Ok(());
        }
        warn!(
            service = %self.service_id(),
            declared,
            "rejected observation for another service"
        );
        crate::metrics::record_observation_rejected(self.service_id(), "service_mismatch");
        Err(QosError::ServiceMismatch {
            expected: self.service_id().clone(),
            actual: declared.to_string(),
        })
    }

    fn log_merge(&self, outcome: &MergeOutcome) {
        if !outcome.evicted_endpoints.is_empty() {
            debug!(
                service = %self.service_id(),
                evicted = outcome.evicted_endpoints.len(),
                "endpoint store at capacity, evicted least recently updated"
            );
        }
        if outcome.sanctions_applied > 0 {
            info!(
                service = %self.service_id(),
                sanctions = outcome.sanctions_applied,
                "endpoints sanctioned"
            );
        }
        trace!(
            service = %self.service_id(),
            endpoints = outcome.updated_endpoints.len(),
            parameters = outcome.parameters_updated,
            "observations merged"
        );
    }
}
