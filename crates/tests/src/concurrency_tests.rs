//! Concurrency tests for the shared service state.
//!
//! Readers must only ever see a parameter's value from before or after a write, and
//! concurrent merges must not lose each other's consensus increments.

use crate::mock_infrastructure::{create_evm_service, create_journal};
use qos_core::{
    evm::{
        ARCHIVAL_BALANCE_CONSENSUS, BALANCE, BALANCE_BLOCK, BLOCK_NUMBER, METHOD_BLOCK_NUMBER,
        METHOD_GET_BALANCE,
    },
    journal::{EndpointQueryResult, RequestJournal},
    state::{ParameterUpdates, ServiceState, StateParameter},
    types::{EndpointAddr, JsonRpcRequest, JsonRpcResponse, ServiceId},
};
use serde_json::json;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

#[test]
fn test_readers_see_whole_values_during_updates() {
    let state = Arc::new(ServiceState::new(ServiceId::new("eth"), 16));
    let mut before = ParameterUpdates::new();
    before.set("head", StateParameter::Int(1));
    before.set("label", StateParameter::Str("one".to_string()));
    let mut after = ParameterUpdates::new();
    after.set("head", StateParameter::Int(2));
    after.set("label", StateParameter::Str("two".to_string()));
    state.update_parameters(&before);

    let done = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let state = Arc::clone(&state);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut reads = 0u64;
                while !done.load(Ordering::Relaxed) {
                    let head = state.get_int_param("head");
                    assert!(matches!(head, Some(1 | 2)), "torn read: {head:?}");
                    let label = state.get_str_param("label");
                    assert!(matches!(label.as_deref(), Some("one" | "two")), "torn read: {label:?}");
                    reads += 1;
                }
                reads
            })
        })
        .collect();

    for i in 0..2_000 {
        state.update_parameters(if i % 2 == 0 { &after } else { &before });
    }
    done.store(true, Ordering::Relaxed);

    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
}

fn balance_journal(addr: &str, balance: &str, at: i64) -> RequestJournal {
    let request = JsonRpcRequest::new(
        METHOD_GET_BALANCE,
        Some(json!(["0x0000000000000000000000000000000000000000", format!("{at:#x}")])),
        json!(2),
    );
    let response = JsonRpcResponse::success(json!("0x0"), Arc::clone(&request.id));
    let result = EndpointQueryResult::new(
        EndpointAddr::new(addr),
        &request,
        bytes::Bytes::new(),
        response,
    )
    .with_str_value(BALANCE, balance)
    .with_int_value(BALANCE_BLOCK, at);

    let mut journal = RequestJournal::new(ServiceId::new("eth"), request);
    journal.push_endpoint_result(result).unwrap();
    journal
}

#[test]
fn test_concurrent_votes_are_not_lost() {
    let qos = create_evm_service("eth", 10);
    let voters: Vec<String> = (0..32).map(|i| format!("node-{i}")).collect();
    for voter in &voters {
        qos.apply_journal(&create_journal("eth", METHOD_BLOCK_NUMBER, voter, &[(BLOCK_NUMBER, 100)]))
            .unwrap();
    }

    thread::scope(|scope| {
        for (i, voter) in voters.iter().enumerate() {
            let qos = Arc::clone(&qos);
            let balance = if i % 4 == 0 { "7" } else { "500" };
            scope.spawn(move || qos.apply_journal(&balance_journal(voter, balance, 90)).unwrap());
        }
    });

    let consensus = qos.state().get_consensus_param(ARCHIVAL_BALANCE_CONSENSUS).unwrap();
    assert_eq!(consensus.get("500"), Some(&24));
    assert_eq!(consensus.get("7"), Some(&8));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_merges_from_tasks() {
    let qos = create_evm_service("eth", 10);

    let tasks: Vec<_> = (0..16i64)
        .map(|i| {
            let qos = Arc::clone(&qos);
            tokio::spawn(async move {
                let addr = format!("node-{i}");
                qos.apply_journal(&create_journal("eth", METHOD_BLOCK_NUMBER, &addr, &[(BLOCK_NUMBER, 100 + i)]))
            })
        })
        .collect();

    for result in futures::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }

    assert_eq!(qos.state().endpoint_count(), 16);
    assert_eq!(qos.state().get_int_param(qos_core::evm::PERCEIVED_BLOCK_NUMBER), Some(115));
}
