//! JSON-RPC shape validation for inbound requests and endpoint responses.

use crate::{
    errors::RequestErrorKind,
    types::{JsonRpcRequest, JsonRpcResponse, JSONRPC_VERSION},
};

impl JsonRpcRequest {
    /// Validates a JSON-RPC request for protocol conformance.
    ///
    /// Method allowlists and parameter rules are service-specific and live in the
    /// service's strategy bundle, not here.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::InvalidVersion`] if not JSON-RPC 2.0
    /// - [`ValidationError::MissingMethod`] if the method is empty
    /// - [`ValidationError::InvalidMethod`] if the method contains invalid characters
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.jsonrpc != JSONRPC_VERSION {
            return Err(ValidationError::InvalidVersion(self.jsonrpc.to_string()));
        }

        if self.method.is_empty() {
            return Err(ValidationError::MissingMethod);
        }

        if !self.method.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(ValidationError::InvalidMethod(self.method.clone()));
        }

        Ok(())
    }
}

impl JsonRpcResponse {
    /// Validates an endpoint response against the request it answers.
    ///
    /// # Errors
    ///
    /// - [`ResponseValidationError::InvalidVersion`] if not JSON-RPC 2.0
    /// - [`ResponseValidationError::IdMismatch`] if the response ID differs from the request's
    /// - [`ResponseValidationError::MissingResultAndError`] if neither member is present
    /// - [`ResponseValidationError::BothResultAndError`] if both members are present
    pub fn validate_for(&self, request: &JsonRpcRequest) -> Result<(), ResponseValidationError> {
        if self.jsonrpc != JSONRPC_VERSION {
            return Err(ResponseValidationError::InvalidVersion(self.jsonrpc.to_string()));
        }

        if self.id != request.id {
            return Err(ResponseValidationError::IdMismatch {
                expected: request.id.to_string(),
                actual: self.id.to_string(),
            });
        }

        match (&self.result, &self.error) {
            (None, None) => Err(ResponseValidationError::MissingResultAndError),
            (Some(_), Some(_)) => Err(ResponseValidationError::BothResultAndError),
            _ => Ok(()),
        }
    }
}

/// Errors that occur during JSON-RPC request validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// JSON-RPC version is not "2.0".
    #[error("Invalid JSON-RPC version: {0}")]
    InvalidVersion(String),

    /// Method member is missing or empty.
    #[error("Missing method")]
    MissingMethod,

    /// Method name contains invalid characters (only alphanumeric and underscore allowed).
    #[error("Invalid method name: {0}")]
    InvalidMethod(String),
}

impl ValidationError {
    /// Maps the validation failure onto the request-level error taxonomy.
    #[must_use]
    pub fn kind(&self) -> RequestErrorKind {
        match self {
            Self::InvalidVersion(_) => RequestErrorKind::InvalidVersion,
            Self::MissingMethod => RequestErrorKind::MissingMethod,
            Self::InvalidMethod(_) => RequestErrorKind::InvalidRequest,
        }
    }
}

/// Errors that occur when an endpoint response does not answer the request it was sent for.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResponseValidationError {
    #[error("Invalid JSON-RPC version: {0}")]
    InvalidVersion(String),

    #[error("Response id {actual} does not match request id {expected}")]
    IdMismatch { expected: String, actual: String },

    #[error("Response has neither result nor error")]
    MissingResultAndError,

    #[error("Response has both result and error")]
    BothResultAndError,
}
