//! Integration tests for the client request path.
//!
//! These tests drive `ServiceQos` the way a gateway does: parse the inbound HTTP request,
//! select an endpoint, record what came back, answer the client and apply the journal.

use crate::mock_infrastructure::{
    create_default_service, create_evm_service, create_http_request, create_json_rpc_request,
    Behavior, MockEndpoint, MockFleet,
};
use qos_core::{
    errors::{RequestErrorKind, ResultErrorKind},
    evm::{BLOCK_NUMBER, METHOD_BLOCK_NUMBER, PERCEIVED_BLOCK_NUMBER},
    types::{EndpointAddr, Retryable},
};
use serde_json::json;

#[test]
fn test_successful_request_updates_endpoint_store() {
    let qos = create_evm_service("eth", 10);
    let fleet = MockFleet::new(vec![MockEndpoint::new("node-1", 0x64, 0)]);

    let body = create_json_rpc_request(METHOD_BLOCK_NUMBER, &json!([]));
    let mut ctx = qos.parse_http_request(&create_http_request(body.to_string()));
    assert!(ctx.should_continue());

    let response = fleet.serve(&mut ctx);
    assert_eq!(response.result, Some(json!("0x64")));
    assert_eq!(*response.id, json!(1));

    ctx.apply().unwrap();
    let endpoint = qos.state().endpoint(&EndpointAddr::new("node-1")).unwrap();
    assert_eq!(endpoint.get_int_result(METHOD_BLOCK_NUMBER, BLOCK_NUMBER), Some(100));
    assert_eq!(qos.state().get_int_param(PERCEIVED_BLOCK_NUMBER), Some(100));
}

#[test]
fn test_endpoint_failures_fall_through_to_next_candidate() {
    let qos = create_default_service("eth", 16);
    let fleet = MockFleet::new(vec![
        MockEndpoint::new("empty", 1, 0).with_behavior(Behavior::Empty),
        MockEndpoint::new("garbage", 1, 0).with_behavior(Behavior::Garbage),
        MockEndpoint::new("wrong-id", 1, 0).with_behavior(Behavior::WrongId),
        MockEndpoint::new("healthy", 7, 0),
    ]);

    let body = create_json_rpc_request(METHOD_BLOCK_NUMBER, &json!([]));
    let mut ctx = qos.parse_http_request(&create_http_request(body.to_string()));
    let response = fleet.serve(&mut ctx);

    assert_eq!(response.result, Some(json!("0x7")));
    let errors: Vec<Option<ResultErrorKind>> =
        ctx.journal().endpoint_results().iter().map(|r| r.error()).collect();
    assert_eq!(
        errors,
        vec![
            Some(ResultErrorKind::EmptyResponse),
            Some(ResultErrorKind::ParseError),
            Some(ResultErrorKind::ResponseValidationError),
            None,
        ]
    );

    ctx.apply().unwrap();
    assert_eq!(qos.state().endpoint_count(), 4);
}

#[test]
fn test_all_endpoints_failing_yields_retryable_error() {
    let qos = create_default_service("eth", 16);
    let fleet = MockFleet::new(vec![
        MockEndpoint::new("a", 1, 0).with_behavior(Behavior::Empty),
        MockEndpoint::new("b", 1, 0).with_behavior(Behavior::Garbage),
    ]);

    let body = create_json_rpc_request("eth_chainId", &json!([]));
    let mut ctx = qos.parse_http_request(&create_http_request(body.to_string()));
    let response = fleet.serve(&mut ctx);

    let error = response.error.unwrap();
    assert_eq!(error.code, -32000);
    assert_eq!(error.retryable, Some(Retryable::Yes));
    assert_eq!(ctx.journal().endpoint_results().len(), 2);
}

#[test]
fn test_malformed_requests_never_reach_an_endpoint() {
    let qos = create_default_service("eth", 16);
    let fleet = MockFleet::new(vec![MockEndpoint::new("node-1", 1, 0)]);

    let cases = [
        ("{not json", RequestErrorKind::ParseError, -32700),
        ("[1, 2, 3]", RequestErrorKind::InvalidRequest, -32600),
        (r#"{"jsonrpc":"2.0","id":5}"#, RequestErrorKind::MissingMethod, -32600),
        (r#"{"jsonrpc":"1.0","method":"eth_chainId","id":5}"#, RequestErrorKind::InvalidVersion, -32600),
    ];

    for (body, kind, code) in cases {
        let mut ctx = qos.parse_http_request(&create_http_request(body));
        assert!(!ctx.should_continue(), "{body} should be rejected");
        assert_eq!(ctx.journal().request_error().map(|e| e.kind), Some(kind));

        let response = fleet.serve(&mut ctx);
        let error = response.error.unwrap();
        assert_eq!(error.code, code, "{body}");
        assert_eq!(error.retryable, Some(Retryable::No), "{body}");
        assert!(ctx.journal().endpoint_results().is_empty());

        ctx.apply().unwrap();
    }

    assert_eq!(qos.state().endpoint_count(), 0);
}

#[test]
fn test_rejected_request_echoes_client_id() {
    let qos = create_default_service("eth", 16);
    let ctx = qos.parse_http_request(&create_http_request(r#"{"jsonrpc":"1.0","method":"x","id":"abc"}"#));

    assert_eq!(*ctx.client_response().id, json!("abc"));
}

#[test]
fn test_request_observations_survive_the_wire() {
    let qos = create_evm_service("eth", 10);
    let fleet = MockFleet::new(vec![MockEndpoint::new("node-1", 0x64, 0)]);

    let body = create_json_rpc_request(METHOD_BLOCK_NUMBER, &json!([]));
    let mut ctx = qos.parse_http_request(&create_http_request(body.to_string()));
    fleet.serve(&mut ctx);

    let observations = ctx.observations();
    let decoded =
        qos_core::observation::QosObservations::from_bytes(&observations.to_bytes().unwrap())
            .unwrap();
    let journal = qos_core::journal::RequestJournal::try_from(decoded).unwrap();

    assert_eq!(&journal, ctx.journal());
}
