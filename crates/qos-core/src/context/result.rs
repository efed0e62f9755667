//! Turning raw endpoint payloads into typed [`EndpointQueryResult`]s.
//!
//! # Pipeline
//!
//! ```text
//! payload ─► empty? ──────────────► EmptyResponse (retryable)
//!    │
//!    ▼
//! parse JSON-RPC ─ fails ─────────► ParseError (retryable)
//!    │
//!    ▼
//! validate vs request ─ fails ────► ResponseValidationError (retryable)
//!    │
//!    ▼
//! per-method ResultBuilder (default records no attributes)
//! ```

use crate::{
    definition::QosDefinition,
    errors::ResultErrorKind,
    journal::EndpointQueryResult,
    state::{ConsensusMap, Endpoint, ServiceState, StateData},
    types::{EndpointAddr, JsonRpcRequest, JsonRpcResponse},
};
use bytes::Bytes;
use tracing::debug;

/// Read-only view handed to a [`ResultBuilder`](crate::definition::ResultBuilder).
///
/// Lets a builder compare what an endpoint reported against the service's current view,
/// e.g. a reported block number against the perceived chain head.
pub struct EndpointQueryResultContext<'a> {
    state: &'a StateData,
    request: &'a JsonRpcRequest,
    endpoint_addr: &'a EndpointAddr,
}

impl<'a> EndpointQueryResultContext<'a> {
    pub(crate) fn new(
        state: &'a StateData,
        request: &'a JsonRpcRequest,
        endpoint_addr: &'a EndpointAddr,
    ) -> Self {
        Self { state, request, endpoint_addr }
    }

    /// Request the endpoint was answering.
    #[must_use]
    pub fn request(&self) -> &JsonRpcRequest {
        self.request
    }

    #[must_use]
    pub fn endpoint_addr(&self) -> &EndpointAddr {
        self.endpoint_addr
    }

    /// Previously stored results of the responding endpoint.
    #[must_use]
    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.state.endpoint(self.endpoint_addr)
    }

    #[must_use]
    pub fn get_str_param(&self, name: &str) -> Option<&str> {
        self.state.get_str_param(name)
    }

    #[must_use]
    pub fn get_int_param(&self, name: &str) -> Option<i64> {
        self.state.get_int_param(name)
    }

    #[must_use]
    pub fn get_consensus_param(&self, name: &str) -> Option<&ConsensusMap> {
        self.state.get_consensus_param(name)
    }
}

/// Builds the typed result for one endpoint response.
///
/// Failures never escape as errors: each is captured on the returned result with its
/// classification so the journal, the state update path and the client response all see it.
pub(crate) fn build_endpoint_query_result(
    state: &ServiceState,
    definition: &QosDefinition,
    request: &JsonRpcRequest,
    endpoint_addr: &EndpointAddr,
    payload: Bytes,
) -> EndpointQueryResult {
    let service = state.service_id();

    if payload.is_empty() {
        debug!(
            service = %service,
            endpoint = %endpoint_addr,
            method = %request.method,
            "empty endpoint response"
        );
        crate::metrics::record_endpoint_failure(service, ResultErrorKind::EmptyResponse);
        return EndpointQueryResult::failed(
            endpoint_addr.clone(),
            request,
            payload,
            ResultErrorKind::EmptyResponse,
        );
    }

    let response: JsonRpcResponse = match serde_json::from_slice(&payload) {
        Ok(response) => response,
        Err(e) => {
            debug!(
                service = %service,
                endpoint = %endpoint_addr,
                method = %request.method,
                error = %e,
                "unparseable endpoint response"
            );
            crate::metrics::record_endpoint_failure(service, ResultErrorKind::ParseError);
            return EndpointQueryResult::failed(
                endpoint_addr.clone(),
                request,
                payload,
                ResultErrorKind::ParseError,
            );
        }
    };

    if let Err(e) = response.validate_for(request) {
        debug!(
            service = %service,
            endpoint = %endpoint_addr,
            method = %request.method,
            error = %e,
            "invalid endpoint response"
        );
        crate::metrics::record_endpoint_failure(service, ResultErrorKind::ResponseValidationError);
        return EndpointQueryResult::failed(
            endpoint_addr.clone(),
            request,
            payload,
            ResultErrorKind::ResponseValidationError,
        );
    }

    let builder = definition.result_builder(&request.method);
    let data = state.read();
    let ctx = EndpointQueryResultContext::new(&data, request, endpoint_addr);
    let partial = EndpointQueryResult::new(endpoint_addr.clone(), request, payload, response);
    builder.build_result(&ctx, partial)
}
