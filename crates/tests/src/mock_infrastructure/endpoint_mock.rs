//! Scripted EVM endpoints and a gateway-style driver around them.

use bytes::Bytes;
use qos_core::{
    evm::{METHOD_BLOCK_NUMBER, METHOD_GET_BALANCE},
    observation::QosObservations,
    qos::{RequestContext, ServiceQos},
    types::{EndpointAddr, JsonRpcRequest, JsonRpcResponse},
};
use serde_json::{json, Value};
use std::sync::Arc;

/// How a mock endpoint answers every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Healthy,
    /// Closes the connection without a body.
    Empty,
    /// Returns bytes that are not JSON.
    Garbage,
    /// Answers with a different request ID.
    WrongId,
}

/// A node with a fixed head and a fixed balance for every queried account and block.
#[derive(Debug, Clone)]
pub struct MockEndpoint {
    pub addr: EndpointAddr,
    pub head: u64,
    pub balance: u128,
    pub behavior: Behavior,
}

impl MockEndpoint {
    #[must_use]
    pub fn new(addr: &str, head: u64, balance: u128) -> Self {
        Self { addr: EndpointAddr::new(addr), head, balance, behavior: Behavior::Healthy }
    }

    #[must_use]
    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Raw response payload for `request`.
    #[must_use]
    pub fn answer(&self, request: &JsonRpcRequest) -> Bytes {
        let result = match request.method.as_str() {
            METHOD_BLOCK_NUMBER => json!(format!("{:#x}", self.head)),
            METHOD_GET_BALANCE => json!(format!("{:#x}", self.balance)),
            _ => Value::Null,
        };

        match self.behavior {
            Behavior::Healthy => success_payload(&request.id, result),
            Behavior::Empty => Bytes::new(),
            Behavior::Garbage => Bytes::from_static(b"<html>502 Bad Gateway</html>"),
            Behavior::WrongId => success_payload(&json!("someone-else"), result),
        }
    }
}

/// The endpoints a gateway instance can route to.
#[derive(Debug, Clone, Default)]
pub struct MockFleet {
    endpoints: Vec<MockEndpoint>,
}

impl MockFleet {
    #[must_use]
    pub fn new(endpoints: Vec<MockEndpoint>) -> Self {
        Self { endpoints }
    }

    #[must_use]
    pub fn addrs(&self) -> Vec<EndpointAddr> {
        self.endpoints.iter().map(|e| e.addr.clone()).collect()
    }

    #[must_use]
    pub fn get(&self, addr: &EndpointAddr) -> Option<&MockEndpoint> {
        self.endpoints.iter().find(|e| &e.addr == addr)
    }

    /// Runs one probe round against every endpoint, applying each probe locally.
    ///
    /// Returns the observations a gateway would publish, in the order they were applied.
    pub fn run_quality_checks(&self, qos: &Arc<ServiceQos>) -> Vec<QosObservations> {
        let mut published = Vec::new();
        for endpoint in &self.endpoints {
            for mut ctx in qos.get_required_quality_checks(&endpoint.addr) {
                let target = ctx.select_endpoint(&[]).expect("probe is pinned");
                let request = ctx.request().expect("probe has a request").clone();
                let payload = self.get(&target).expect("pinned to a fleet member").answer(&request);

                ctx.record_endpoint_response(&target, payload).expect("probe accepts results");
                ctx.apply().expect("probe journal applies");
                published.push(ctx.observations());
            }
        }
        published
    }

    /// Dispatches a client request, moving on to the next candidate after each endpoint
    /// failure, and returns the response the client would receive.
    pub fn serve(&self, ctx: &mut RequestContext) -> JsonRpcResponse {
        let mut candidates = self.addrs();
        while let Some(target) = ctx.select_endpoint(&candidates) {
            let Some(request) = ctx.request().cloned() else {
                break;
            };
            let payload = self.get(&target).map_or_else(Bytes::new, |e| e.answer(&request));
            match ctx.record_endpoint_response(&target, payload) {
                Ok(None) | Err(_) => break,
                Ok(Some(_)) => candidates.retain(|addr| addr != &target),
            }
        }
        ctx.client_response()
    }
}

fn success_payload(id: &Value, result: Value) -> Bytes {
    let response = JsonRpcResponse::success(result, Arc::new(id.clone()));
    Bytes::from(serde_json::to_vec(&response).expect("response serializes"))
}
