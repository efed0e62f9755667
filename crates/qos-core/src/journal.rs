//! Per-request journal and per-endpoint query results.
//!
//! A [`RequestJournal`] ties one external request to its outcome: the parsed request, an
//! optional request-level error, and the [`EndpointQueryResult`]s gathered while serving it.
//! Journals are built locally per request or reconstructed from an observation received
//! from another gateway instance, consumed by the state update path, and then dropped.

use crate::{
    errors::{RequestError, ResultErrorKind},
    types::{EndpointAddr, JsonRpcRequest, JsonRpcResponse, ServiceId},
};
use bytes::Bytes;
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;

/// Outcome of sending one JSON-RPC request to one endpoint.
///
/// Immutable once built: result builders receive a partially-built value by ownership and
/// return the finished one through the consuming `with_*` methods.
///
/// Equality covers what an observation carries across instances (source, method, request ID,
/// attributes, failure). The raw payload and parsed response stay local to the instance that
/// received them.
#[derive(Debug, Clone)]
pub struct EndpointQueryResult {
    endpoint_addr: EndpointAddr,
    method: String,
    request_id: Arc<serde_json::Value>,
    raw_payload: Bytes,
    response: Option<JsonRpcResponse>,
    str_values: HashMap<String, String>,
    int_values: HashMap<String, i64>,
    error: Option<ResultErrorKind>,
}

impl EndpointQueryResult {
    /// Creates a result for a parsed and validated endpoint response.
    #[must_use]
    pub fn new(
        endpoint_addr: EndpointAddr,
        request: &JsonRpcRequest,
        raw_payload: Bytes,
        response: JsonRpcResponse,
    ) -> Self {
        Self {
            endpoint_addr,
            method: request.method.clone(),
            request_id: Arc::clone(&request.id),
            raw_payload,
            response: Some(response),
            str_values: HashMap::new(),
            int_values: HashMap::new(),
            error: None,
        }
    }

    /// Creates a result for a response that could not be parsed or validated.
    #[must_use]
    pub fn failed(
        endpoint_addr: EndpointAddr,
        request: &JsonRpcRequest,
        raw_payload: Bytes,
        error: ResultErrorKind,
    ) -> Self {
        Self {
            endpoint_addr,
            method: request.method.clone(),
            request_id: Arc::clone(&request.id),
            raw_payload,
            response: None,
            str_values: HashMap::new(),
            int_values: HashMap::new(),
            error: Some(error),
        }
    }

    /// Rebuilds a result from its observed facts (no payload, no parsed response).
    pub(crate) fn from_observed(
        endpoint_addr: EndpointAddr,
        method: String,
        request_id: Arc<serde_json::Value>,
        str_values: HashMap<String, String>,
        int_values: HashMap<String, i64>,
        error: Option<ResultErrorKind>,
    ) -> Self {
        Self {
            endpoint_addr,
            method,
            request_id,
            raw_payload: Bytes::new(),
            response: None,
            str_values,
            int_values,
            error,
        }
    }

    /// Records a string attribute extracted from the response.
    #[must_use]
    pub fn with_str_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.str_values.insert(key.into(), value.into());
        self
    }

    /// Records an integer attribute extracted from the response.
    #[must_use]
    pub fn with_int_value(mut self, key: impl Into<String>, value: i64) -> Self {
        self.int_values.insert(key.into(), value);
        self
    }

    #[inline]
    #[must_use]
    pub fn endpoint_addr(&self) -> &EndpointAddr {
        &self.endpoint_addr
    }

    #[inline]
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[must_use]
    pub fn request_id(&self) -> &Arc<serde_json::Value> {
        &self.request_id
    }

    #[must_use]
    pub fn raw_payload(&self) -> &Bytes {
        &self.raw_payload
    }

    /// Parsed and validated response, absent on failure and on results received from peers.
    #[must_use]
    pub fn response(&self) -> Option<&JsonRpcResponse> {
        self.response.as_ref()
    }

    /// Shortcut to the `result` member of a successful response.
    #[must_use]
    pub fn result_value(&self) -> Option<&serde_json::Value> {
        self.response.as_ref().and_then(|r| r.result.as_ref())
    }

    #[must_use]
    pub fn get_str_value(&self, key: &str) -> Option<&str> {
        self.str_values.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn get_int_value(&self, key: &str) -> Option<i64> {
        self.int_values.get(key).copied()
    }

    #[must_use]
    pub fn str_values(&self) -> &HashMap<String, String> {
        &self.str_values
    }

    #[must_use]
    pub fn int_values(&self) -> &HashMap<String, i64> {
        &self.int_values
    }

    #[must_use]
    pub fn error(&self) -> Option<ResultErrorKind> {
        self.error
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    /// Returns `true` if the failure (if any) leaves the request safe to resubmit.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.error.is_some_and(ResultErrorKind::is_retryable)
    }
}

impl PartialEq for EndpointQueryResult {
    fn eq(&self, other: &Self) -> bool {
        self.endpoint_addr == other.endpoint_addr &&
            self.method == other.method &&
            self.request_id == other.request_id &&
            self.str_values == other.str_values &&
            self.int_values == other.int_values &&
            self.error == other.error
    }
}

/// Structural violations of the journal invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JournalError {
    /// A request that failed outright cannot also have produced endpoint data.
    #[error("request error present alongside {0} endpoint results")]
    ErrorWithEndpointResults(usize),

    /// A journal without a request error must carry the request it served.
    #[error("journal has neither a request nor a request error")]
    MissingRequest,
}

/// Record of one external request: parsed form, error (if any), and endpoint results.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestJournal {
    service_id: ServiceId,
    request: Option<JsonRpcRequest>,
    request_error: Option<RequestError>,
    endpoint_results: Vec<EndpointQueryResult>,
}

impl RequestJournal {
    /// Creates a journal for a successfully parsed request.
    #[must_use]
    pub fn new(service_id: ServiceId, request: JsonRpcRequest) -> Self {
        Self { service_id, request: Some(request), request_error: None, endpoint_results: vec![] }
    }

    /// Creates a journal for a request that failed before reaching any endpoint.
    #[must_use]
    pub fn failed(
        service_id: ServiceId,
        request: Option<JsonRpcRequest>,
        error: RequestError,
    ) -> Self {
        Self { service_id, request, request_error: Some(error), endpoint_results: vec![] }
    }

    /// Assembles a journal from parts and checks its invariants.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] if the parts violate the journal invariants.
    pub fn from_parts(
        service_id: ServiceId,
        request: Option<JsonRpcRequest>,
        request_error: Option<RequestError>,
        endpoint_results: Vec<EndpointQueryResult>,
    ) -> Result<Self, JournalError> {
        let journal = Self { service_id, request, request_error, endpoint_results };
        journal.check_consistency()?;
        Ok(journal)
    }

    /// Appends an endpoint result gathered while serving the request.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::ErrorWithEndpointResults`] if the request already failed.
    pub fn push_endpoint_result(
        &mut self,
        result: EndpointQueryResult,
    ) -> Result<(), JournalError> {
        if self.request_error.is_some() {
            return Err(JournalError::ErrorWithEndpointResults(self.endpoint_results.len() + 1));
        }
        self.endpoint_results.push(result);
        Ok(())
    }

    /// Verifies the journal invariants.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] describing the first violated invariant.
    pub fn check_consistency(&self) -> Result<(), JournalError> {
        if self.request_error.is_some() && !self.endpoint_results.is_empty() {
            return Err(JournalError::ErrorWithEndpointResults(self.endpoint_results.len()));
        }
        if self.request_error.is_none() && self.request.is_none() {
            return Err(JournalError::MissingRequest);
        }
        Ok(())
    }

    #[must_use]
    pub fn service_id(&self) -> &ServiceId {
        &self.service_id
    }

    #[must_use]
    pub fn request(&self) -> Option<&JsonRpcRequest> {
        self.request.as_ref()
    }

    #[must_use]
    pub fn request_error(&self) -> Option<&RequestError> {
        self.request_error.as_ref()
    }

    #[must_use]
    pub fn endpoint_results(&self) -> &[EndpointQueryResult] {
        &self.endpoint_results
    }

    /// ID to echo in client responses; `null` if the request never parsed.
    #[must_use]
    pub fn response_id(&self) -> Arc<serde_json::Value> {
        self.request
            .as_ref()
            .map_or_else(|| Arc::new(serde_json::Value::Null), |r| Arc::clone(&r.id))
    }
}
