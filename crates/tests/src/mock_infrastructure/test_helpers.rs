//! Test Helper Functions and Utilities
//!
//! Common helpers for creating services, inbound requests and journals.

use bytes::Bytes;
use qos_core::{
    definition::QosDefinition,
    evm::{EvmConfig, EvmQosDefinition},
    journal::{EndpointQueryResult, RequestJournal},
    qos::ServiceQos,
    types::{EndpointAddr, JsonRpcRequest, JsonRpcResponse, ServiceId},
};
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};

/// Creates an EVM service with the given archival offset and default tunables otherwise.
#[must_use]
pub fn create_evm_service(name: &str, archival_offset_blocks: u64) -> Arc<ServiceQos> {
    let config = EvmConfig { archival_offset_blocks, ..EvmConfig::default() };
    Arc::new(ServiceQos::new(ServiceId::new(name), EvmQosDefinition::build(config), 64))
}

/// Creates a service with the passthrough strategy bundle.
#[must_use]
pub fn create_default_service(name: &str, max_endpoints: usize) -> Arc<ServiceQos> {
    Arc::new(ServiceQos::new(ServiceId::new(name), QosDefinition::default(), max_endpoints))
}

/// Creates a JSON-RPC request body.
#[must_use]
pub fn create_json_rpc_request(method: &str, params: &Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params
    })
}

/// Wraps a body in a POST request as the transport layer would hand it over.
#[must_use]
pub fn create_http_request(body: impl Into<Bytes>) -> http::Request<Bytes> {
    http::Request::builder()
        .method(http::Method::POST)
        .uri("/v1/eth")
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .expect("valid request")
}

/// Journal of one request answered successfully by `addr`, with the given attributes.
#[must_use]
pub fn create_journal(
    service: &str,
    method: &str,
    addr: &str,
    int_values: &[(&str, i64)],
) -> RequestJournal {
    let request = JsonRpcRequest::new(method, None, json!(1));
    let response = JsonRpcResponse::success(json!("0x0"), Arc::clone(&request.id));
    let result = int_values.iter().fold(
        EndpointQueryResult::new(EndpointAddr::new(addr), &request, Bytes::new(), response),
        |result, (key, value)| result.with_int_value(*key, *value),
    );

    let mut journal = RequestJournal::new(ServiceId::new(service), request);
    journal.push_endpoint_result(result).expect("consistent journal");
    journal
}

/// Polls `condition` until it holds or `timeout` elapses.
pub async fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
