use super::ServiceQos;
use crate::{
    context::result::build_endpoint_query_result,
    errors::{QosError, RequestError, RequestErrorKind, ResultErrorKind, ENDPOINT_FAILURE_CODE},
    journal::{EndpointQueryResult, JournalError, RequestJournal},
    observation::QosObservations,
    types::{EndpointAddr, JsonRpcRequest, JsonRpcResponse},
};
use bytes::Bytes;
use std::{fmt, sync::Arc};
use thiserror::Error;

/// Failure to read an inbound request body from the transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to read request body: {0}")]
pub struct BodyReadError(pub String);

/// Inbound HTTP request as seen by the engine.
///
/// Transport layers implement this for their request type; the engine only needs the body.
pub trait InboundRequest {
    /// # Errors
    ///
    /// Returns [`BodyReadError`] if the transport could not deliver the body.
    fn read_body(&self) -> Result<Bytes, BodyReadError>;
}

impl<B: AsRef<[u8]>> InboundRequest for http::Request<B> {
    fn read_body(&self) -> Result<Bytes, BodyReadError> {
        Ok(Bytes::copy_from_slice(self.body().as_ref()))
    }
}

/// Per-request handle owned by the gateway while serving one request.
///
/// Created by [`ServiceQos::parse_http_request`] for client requests or by
/// [`ServiceQos::get_required_quality_checks`] for probes. Collects endpoint responses into
/// its journal, renders the client response and exports the observation message.
pub struct RequestContext {
    qos: Arc<ServiceQos>,
    journal: RequestJournal,
    pinned_endpoint: Option<EndpointAddr>,
}

impl RequestContext {
    pub(crate) fn new(qos: Arc<ServiceQos>, request: JsonRpcRequest) -> Self {
        let journal = RequestJournal::new(qos.service_id().clone(), request);
        Self { qos, journal, pinned_endpoint: None }
    }

    pub(crate) fn failed(
        qos: Arc<ServiceQos>,
        request: Option<JsonRpcRequest>,
        kind: RequestErrorKind,
        message: impl Into<String>,
    ) -> Self {
        let journal = RequestJournal::failed(
            qos.service_id().clone(),
            request,
            RequestError::new(kind, message),
        );
        Self { qos, journal, pinned_endpoint: None }
    }

    pub(crate) fn probe(
        qos: Arc<ServiceQos>,
        request: JsonRpcRequest,
        endpoint: EndpointAddr,
    ) -> Self {
        let mut ctx = Self::new(qos, request);
        ctx.pinned_endpoint = Some(endpoint);
        ctx
    }

    /// `false` when the request already failed and should be answered without dispatch.
    #[must_use]
    pub fn should_continue(&self) -> bool {
        self.journal.request_error().is_none()
    }

    #[must_use]
    pub fn request(&self) -> Option<&JsonRpcRequest> {
        self.journal.request()
    }

    #[must_use]
    pub fn journal(&self) -> &RequestJournal {
        &self.journal
    }

    #[must_use]
    pub fn into_journal(self) -> RequestJournal {
        self.journal
    }

    /// Endpoint a probe must be sent to; `None` for client requests.
    #[must_use]
    pub fn pinned_endpoint(&self) -> Option<&EndpointAddr> {
        self.pinned_endpoint.as_ref()
    }

    #[must_use]
    pub fn is_probe(&self) -> bool {
        self.pinned_endpoint.is_some()
    }

    /// Chooses the endpoint to dispatch to among `candidates`.
    ///
    /// Probes always go to their pinned endpoint. Failed requests select nothing.
    #[must_use]
    pub fn select_endpoint(&self, candidates: &[EndpointAddr]) -> Option<EndpointAddr> {
        if let Some(pinned) = &self.pinned_endpoint {
            return Some(pinned.clone());
        }
        if !self.should_continue() {
            return None;
        }
        let request = self.journal.request()?;
        self.qos.select_endpoint(request, candidates)
    }

    /// Builds the typed result for an endpoint's raw response and records it in the journal.
    ///
    /// Returns the failure classification of the recorded result, `None` if it is valid.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] if the request failed before dispatch.
    pub fn record_endpoint_response(
        &mut self,
        endpoint_addr: &EndpointAddr,
        payload: Bytes,
    ) -> Result<Option<ResultErrorKind>, JournalError> {
        if self.journal.request_error().is_some() {
            return Err(JournalError::ErrorWithEndpointResults(
                self.journal.endpoint_results().len() + 1,
            ));
        }
        let request = self.journal.request().ok_or(JournalError::MissingRequest)?;

        let result = build_endpoint_query_result(
            self.qos.state(),
            self.qos.definition(),
            request,
            endpoint_addr,
            payload,
        );
        let error = result.error();
        self.journal.push_endpoint_result(result)?;
        Ok(error)
    }

    /// Response to return to the client.
    ///
    /// The request error if the request failed; otherwise the last valid endpoint response;
    /// otherwise a retryable error describing the last endpoint failure.
    #[must_use]
    pub fn client_response(&self) -> JsonRpcResponse {
        let id = self.journal.response_id();

        if let Some(error) = self.journal.request_error() {
            return error.to_response(id);
        }

        let results = self.journal.endpoint_results();
        if let Some(response) =
            results.iter().rev().find_map(EndpointQueryResult::response)
        {
            return response.clone();
        }

        let message = results
            .last()
            .and_then(EndpointQueryResult::error)
            .map_or("no endpoint response available", ResultErrorKind::description);
        JsonRpcResponse::error_with_retry(ENDPOINT_FAILURE_CODE, message.to_string(), true, id)
    }

    /// Observation message for sharing this request's outcome with other instances.
    #[must_use]
    pub fn observations(&self) -> QosObservations {
        QosObservations::from(&self.journal)
    }

    /// Feeds the journal into the owning service's state update path.
    ///
    /// # Errors
    ///
    /// See [`ServiceQos::apply_journal`].
    pub fn apply(&self) -> Result<(), QosError> {
        self.qos.apply_journal(&self.journal)
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("service", self.qos.service_id())
            .field("journal", &self.journal)
            .field("pinned_endpoint", &self.pinned_endpoint)
            .finish()
    }
}
