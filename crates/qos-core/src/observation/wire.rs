//! Portable form of a [`RequestJournal`].
//!
//! One observation message carries everything another gateway instance needs to replay a
//! request's outcome through its own state update path:
//!
//! ```json
//! {
//!   "service_name": "eth",
//!   "origin": "0b6f4c1e-2d6a-4f0e-9a53-5c1f0e7d2b11",
//!   "request": { "jsonrpc": "2.0", "method": "eth_blockNumber", "id": 1 },
//!   "endpoint_observations": [
//!     { "endpoint_addr": "node-1", "method": "eth_blockNumber",
//!       "int_values": { "block_number": 19000000 } },
//!     { "endpoint_addr": "node-2", "method": "eth_blockNumber",
//!       "error_kind": "empty_response" }
//!   ]
//! }
//! ```
//!
//! Raw payloads and parsed responses are not carried: remote instances only consume the
//! extracted attributes and failure classifications.

use crate::{
    errors::{RequestError, RequestErrorKind, ResultErrorKind},
    journal::{EndpointQueryResult, JournalError, RequestJournal},
    types::{deserialize_some, EndpointAddr, JsonRpcRequest, ServiceId, JSONRPC_VERSION_COW},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, collections::HashMap, sync::Arc};
use thiserror::Error;

/// Errors converting between journals, observation messages and bytes.
#[derive(Error, Debug)]
pub enum ObservationError {
    #[error("failed to encode observation: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode observation: {0}")]
    Decode(#[source] serde_json::Error),

    #[error(transparent)]
    Journal(#[from] JournalError),
}

/// The observation message for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QosObservations {
    pub service_name: String,
    /// Instance ID of the messenger that published the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<ObservedRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_error: Option<ObservedRequestError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoint_observations: Vec<EndpointObservation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedRequest {
    #[serde(default = "default_jsonrpc")]
    pub jsonrpc: Cow<'static, str>,
    pub method: String,
    #[serde(default)]
    pub id: serde_json::Value,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub params: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedRequestError {
    pub kind: RequestErrorKind,
    #[serde(default)]
    pub message: String,
}

/// What one endpoint reported while serving the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointObservation {
    pub endpoint_addr: EndpointAddr,
    pub method: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub str_values: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub int_values: HashMap<String, i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ResultErrorKind>,
}

fn default_jsonrpc() -> Cow<'static, str> {
    JSONRPC_VERSION_COW
}

impl QosObservations {
    /// # Errors
    ///
    /// Returns [`ObservationError::Encode`] if serialization fails.
    pub fn to_bytes(&self) -> Result<Bytes, ObservationError> {
        serde_json::to_vec(self).map(Bytes::from).map_err(ObservationError::Encode)
    }

    /// # Errors
    ///
    /// Returns [`ObservationError::Decode`] if `bytes` is not an observation message.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ObservationError> {
        serde_json::from_slice(bytes).map_err(ObservationError::Decode)
    }
}

impl From<&JsonRpcRequest> for ObservedRequest {
    fn from(request: &JsonRpcRequest) -> Self {
        Self {
            jsonrpc: request.jsonrpc.clone(),
            method: request.method.clone(),
            id: (*request.id).clone(),
            params: request.params.clone(),
        }
    }
}

impl From<ObservedRequest> for JsonRpcRequest {
    fn from(observed: ObservedRequest) -> Self {
        Self {
            jsonrpc: observed.jsonrpc,
            method: observed.method,
            params: observed.params,
            id: Arc::new(observed.id),
        }
    }
}

impl From<&EndpointQueryResult> for EndpointObservation {
    fn from(result: &EndpointQueryResult) -> Self {
        Self {
            endpoint_addr: result.endpoint_addr().clone(),
            method: result.method().to_string(),
            str_values: result.str_values().clone(),
            int_values: result.int_values().clone(),
            error_kind: result.error(),
        }
    }
}

impl From<&RequestJournal> for QosObservations {
    fn from(journal: &RequestJournal) -> Self {
        Self {
            service_name: journal.service_id().to_string(),
            origin: None,
            request: journal.request().map(ObservedRequest::from),
            request_error: journal.request_error().map(|e| ObservedRequestError {
                kind: e.kind,
                message: e.message.clone(),
            }),
            endpoint_observations: journal
                .endpoint_results()
                .iter()
                .map(EndpointObservation::from)
                .collect(),
        }
    }
}

impl TryFrom<QosObservations> for RequestJournal {
    type Error = ObservationError;

    /// Endpoint results take the request ID of the observed request, which is the request
    /// they answered.
    fn try_from(observations: QosObservations) -> Result<Self, Self::Error> {
        let request: Option<JsonRpcRequest> = observations.request.map(Into::into);
        let request_id = request
            .as_ref()
            .map_or_else(|| Arc::new(serde_json::Value::Null), |r| Arc::clone(&r.id));

        let endpoint_results = observations
            .endpoint_observations
            .into_iter()
            .map(|o| {
                EndpointQueryResult::from_observed(
                    o.endpoint_addr,
                    o.method,
                    Arc::clone(&request_id),
                    o.str_values,
                    o.int_values,
                    o.error_kind,
                )
            })
            .collect();

        let journal = RequestJournal::from_parts(
            ServiceId::new(&observations.service_name),
            request,
            observations.request_error.map(|e| RequestError::new(e.kind, e.message)),
            endpoint_results,
        )?;
        Ok(journal)
    }
}
