use crate::{
    journal::JournalError,
    observation::wire::ObservationError,
    types::{JsonRpcResponse, ServiceId},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// JSON-RPC code used for endpoint-level failures surfaced to clients.
pub const ENDPOINT_FAILURE_CODE: i32 = -32000;

/// Classification of request-level failures.
///
/// Request-level failures are the client's to correct: they are never retried internally and
/// the error response carries `retryable: "false"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestErrorKind {
    /// Inbound body could not be read from the transport.
    BodyReadFailed,
    /// Inbound body is not valid JSON.
    ParseError,
    /// Body is JSON but not a JSON-RPC request object (e.g. a batch or a scalar).
    InvalidRequest,
    /// `method` member is absent or empty.
    MissingMethod,
    /// `jsonrpc` member is not `"2.0"`.
    InvalidVersion,
}

impl RequestErrorKind {
    /// Returns the JSON-RPC error code reported to the client.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::BodyReadFailed |
            Self::InvalidRequest |
            Self::MissingMethod |
            Self::InvalidVersion => -32600,
        }
    }

    /// Returns a static string representation for metrics labels and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BodyReadFailed => "body_read_failed",
            Self::ParseError => "parse_error",
            Self::InvalidRequest => "invalid_request",
            Self::MissingMethod => "missing_method",
            Self::InvalidVersion => "invalid_version",
        }
    }
}

/// Classification of endpoint-level failures recorded on an endpoint query result.
///
/// All endpoint-level failures exclude the offending endpoint from the current attempt but
/// leave the request itself retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultErrorKind {
    /// Endpoint returned zero bytes.
    EmptyResponse,
    /// Payload is not a JSON-RPC response.
    ParseError,
    /// Response does not match the originating request (ID mismatch, malformed shape).
    ResponseValidationError,
}

impl ResultErrorKind {
    /// Returns `true` if the client may safely resubmit the request.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        match self {
            Self::EmptyResponse | Self::ParseError | Self::ResponseValidationError => true,
        }
    }

    /// Returns a static string representation for metrics labels and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EmptyResponse => "empty_response",
            Self::ParseError => "parse_error",
            Self::ResponseValidationError => "response_validation_error",
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::EmptyResponse => "endpoint returned an empty response",
            Self::ParseError => "endpoint returned an unparseable response",
            Self::ResponseValidationError => "endpoint returned an invalid JSON-RPC response",
        }
    }
}

/// A request-level error: what went wrong and a human-readable explanation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestError {
    pub kind: RequestErrorKind,
    pub message: String,
}

impl RequestError {
    #[must_use]
    pub fn new(kind: RequestErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    /// Renders the error as a non-retryable JSON-RPC error response.
    #[must_use]
    pub fn to_response(&self, id: Arc<serde_json::Value>) -> JsonRpcResponse {
        JsonRpcResponse::error_with_retry(self.kind.code(), self.message.clone(), false, id)
    }
}

/// Errors returned by the QoS orchestrator.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum QosError {
    /// Observation declares a different service than the receiving instance.
    #[error("observation for service {actual} delivered to service {expected}")]
    ServiceMismatch { expected: ServiceId, actual: String },

    /// Journal violates its structural invariants; nothing was applied.
    #[error("inconsistent request journal: {0}")]
    InconsistentJournal(#[from] JournalError),

    /// Observation message could not be turned into a journal.
    #[error("invalid observation: {0}")]
    Observation(#[from] ObservationError),
}
