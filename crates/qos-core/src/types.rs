//! Core type definitions for JSON-RPC and service/endpoint identity.
//!
//! # Type Categories
//!
//! ## JSON-RPC Protocol Types
//! - [`JsonRpcRequest`], [`JsonRpcResponse`], [`JsonRpcError`]: Protocol conformance
//! - [`Retryable`]: Non-standard extension telling clients whether resubmission may succeed
//!
//! ## Identity Types
//! - [`ServiceId`]: A logical blockchain service (one chain) with its own QoS state
//! - [`EndpointAddr`]: Opaque address of a backend node, owned by the protocol layer
//!
//! Both identity types wrap `Arc<str>` so they can be cloned into endpoint snapshots,
//! journals and log fields without copying the underlying string.

use serde::{Deserialize, Deserializer, Serialize};
use std::{
    borrow::{Borrow, Cow},
    fmt,
    sync::Arc,
};

/// JSON-RPC protocol version constant to avoid repeated allocations.
pub const JSONRPC_VERSION: &str = "2.0";

/// Pre-allocated `Cow` for JSON-RPC version - zero allocation for static usage.
pub const JSONRPC_VERSION_COW: Cow<'static, str> = Cow::Borrowed(JSONRPC_VERSION);

/// Identifier of a logical blockchain service (e.g. `eth`, `polygon`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(Arc<str>);

impl ServiceId {
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl AsRef<str> for ServiceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ServiceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Opaque address of a backend endpoint.
///
/// The format is owned by the protocol layer that dispatches requests; the engine only
/// compares and hashes addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointAddr(Arc<str>);

impl EndpointAddr {
    #[must_use]
    pub fn new(addr: impl AsRef<str>) -> Self {
        Self(Arc::from(addr.as_ref()))
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EndpointAddr {
    fn from(addr: &str) -> Self {
        Self::new(addr)
    }
}

impl AsRef<str> for EndpointAddr {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for EndpointAddr {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// JSON-RPC 2.0 request structure.
///
/// `jsonrpc`, `method` and `id` default when absent so that a structurally incomplete request
/// still deserializes; [`JsonRpcRequest::validate`](crate::validation) then reports the precise
/// problem (wrong version, missing method) instead of a generic decode failure.
///
/// # Example
///
/// ```
/// use qos_core::types::JsonRpcRequest;
/// use serde_json::json;
///
/// let request = JsonRpcRequest::new("eth_blockNumber", None, json!(1));
///
/// assert_eq!(request.method, "eth_blockNumber");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: Cow<'static, str>,
    #[serde(default)]
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    #[serde(default)]
    pub id: Arc<serde_json::Value>,
}

impl JsonRpcRequest {
    /// Creates a new JSON-RPC request with zero allocation for the version string.
    #[must_use]
    pub fn new(
        method: impl Into<String>,
        params: Option<serde_json::Value>,
        id: serde_json::Value,
    ) -> Self {
        Self { jsonrpc: JSONRPC_VERSION_COW, method: method.into(), params, id: Arc::new(id) }
    }
}

/// JSON-RPC 2.0 response structure.
///
/// A response carries either a `result` or an `error`. `result` is deserialized with
/// [`deserialize_some`] so that an explicit `"result": null` (a legitimate answer, e.g. an
/// unknown transaction) is distinguishable from a missing `result` member.
///
/// # Example
///
/// ```
/// use qos_core::types::JsonRpcResponse;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let response = JsonRpcResponse::success(json!("0x1234"), Arc::new(json!(1)));
/// assert!(response.result.is_some());
/// assert!(response.error.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub jsonrpc: Cow<'static, str>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    #[serde(default)]
    pub id: Arc<serde_json::Value>,
}

impl JsonRpcResponse {
    /// Creates a successful JSON-RPC response.
    #[must_use]
    pub fn success(result: serde_json::Value, id: Arc<serde_json::Value>) -> Self {
        Self { jsonrpc: JSONRPC_VERSION_COW, result: Some(result), error: None, id }
    }

    /// Creates an error JSON-RPC response without a retry hint.
    #[must_use]
    pub fn error(code: i32, message: String, id: Arc<serde_json::Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION_COW,
            result: None,
            error: Some(JsonRpcError { code, message, data: None, retryable: None }),
            id,
        }
    }

    /// Creates an error JSON-RPC response carrying the `retryable` extension field.
    #[must_use]
    pub fn error_with_retry(
        code: i32,
        message: String,
        retryable: bool,
        id: Arc<serde_json::Value>,
    ) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION_COW,
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data: None,
                retryable: Some(Retryable::from(retryable)),
            }),
            id,
        }
    }
}

/// JSON-RPC 2.0 error object.
///
/// Standard error codes:
///
/// - `-32700`: Parse error (invalid JSON)
/// - `-32600`: Invalid request (malformed JSON-RPC)
/// - `-32601`: Method not found
/// - `-32602`: Invalid params
/// - `-32603`: Internal error
/// - `-32000` to `-32099`: Server-defined errors
///
/// `retryable` is a gateway extension and is omitted from the wire when unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retryable: Option<Retryable>,
}

/// Retry hint attached to error responses, serialized as the string `"true"` or `"false"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Retryable {
    #[serde(rename = "true")]
    Yes,
    #[serde(rename = "false")]
    No,
}

impl Retryable {
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Yes)
    }
}

impl From<bool> for Retryable {
    fn from(retryable: bool) -> Self {
        if retryable {
            Self::Yes
        } else {
            Self::No
        }
    }
}

/// Deserializes a present JSON member as `Some`, including an explicit `null`.
///
/// Combine with `#[serde(default)]` so a missing member becomes `None`.
///
/// # Errors
///
/// Propagates the deserializer's error if the member is not valid JSON.
pub fn deserialize_some<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}
