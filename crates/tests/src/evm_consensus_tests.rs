//! Integration tests for EVM archival balance consensus.
//!
//! These tests run probe rounds against a scripted fleet:
//! - The first round learns endpoint heads and fixes the archival block
//! - Later rounds collect archival balances from endpoints that have reached that block
//! - Minority reporters are sanctioned and skipped by selection until the sanction expires

use crate::mock_infrastructure::{create_evm_service, MockEndpoint, MockFleet};
use qos_core::{
    evm::{
        ARCHIVAL_BALANCE_CONSENSUS, ARCHIVAL_BLOCK_NUMBER, DEFAULT_SANCTION_DURATION,
        METHOD_BLOCK_NUMBER, METHOD_GET_BALANCE, PERCEIVED_BLOCK_NUMBER,
    },
    state::ConsensusMap,
    types::{EndpointAddr, JsonRpcRequest},
};
use serde_json::json;

fn fleet() -> MockFleet {
    MockFleet::new(vec![
        MockEndpoint::new("a", 100, 500),
        MockEndpoint::new("b", 100, 500),
        MockEndpoint::new("c", 99, 500),
        MockEndpoint::new("liar", 100, 7),
        MockEndpoint::new("stale", 50, 999),
    ])
}

fn addr(name: &str) -> EndpointAddr {
    EndpointAddr::new(name)
}

#[tokio::test(start_paused = true)]
async fn test_archival_consensus_across_probe_rounds() {
    let qos = create_evm_service("eth", 10);
    let fleet = fleet();

    // "a" is probed before any head is known, so it is only asked for its head.
    let first = fleet.run_quality_checks(&qos);
    assert_eq!(first.len(), 9);
    assert_eq!(first[0].request.as_ref().unwrap().method, METHOD_BLOCK_NUMBER);
    assert_eq!(qos.state().get_int_param(PERCEIVED_BLOCK_NUMBER), Some(100));
    assert_eq!(qos.state().get_int_param(ARCHIVAL_BLOCK_NUMBER), Some(90));

    // "stale" has not reached the archival block, so its answer is not counted.
    let consensus = qos.state().get_consensus_param(ARCHIVAL_BALANCE_CONSENSUS).unwrap();
    assert_eq!(consensus, ConsensusMap::from([("500".to_string(), 2), ("7".to_string(), 1)]));

    // "a" reports for the first time and "stale" is asked again.
    let second = fleet.run_quality_checks(&qos);
    let balance_probes =
        second.iter().filter(|o| o.request.as_ref().unwrap().method == METHOD_GET_BALANCE).count();
    assert_eq!(balance_probes, 2);

    let consensus = qos.state().get_consensus_param(ARCHIVAL_BALANCE_CONSENSUS).unwrap();
    assert_eq!(consensus, ConsensusMap::from([("500".to_string(), 3), ("7".to_string(), 1)]));

    let liar = qos.state().endpoint(&addr("liar")).unwrap();
    assert!(liar.active_sanction().is_some());
    for honest in ["a", "b", "c", "stale"] {
        let endpoint = qos.state().endpoint(&addr(honest)).unwrap();
        assert!(endpoint.active_sanction().is_none(), "{honest} should not be sanctioned");
    }

    // Endpoints that already reported at the archival block are only asked for their head.
    for endpoint in ["a", "b", "liar"] {
        let probes = qos.get_required_quality_checks(&addr(endpoint));
        assert_eq!(probes.len(), 1, "{endpoint}");
        assert!(probes[0].is_probe());
    }
    assert_eq!(qos.get_required_quality_checks(&addr("stale")).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_selection_follows_consensus_and_sanctions() {
    let qos = create_evm_service("eth", 10);
    let fleet = fleet();
    fleet.run_quality_checks(&qos);
    fleet.run_quality_checks(&qos);

    let request = JsonRpcRequest::new(METHOD_GET_BALANCE, Some(json!(["0x0", "latest"])), json!(1));
    let candidates = [addr("liar"), addr("stale"), addr("c"), addr("b")];

    // "liar" is sanctioned, "stale" lags the head and "b" is higher than "c".
    assert_eq!(qos.select_endpoint(&request, &candidates), Some(addr("b")));
    assert_eq!(qos.select_endpoint(&request, &[addr("liar")]), None);
    assert_eq!(qos.select_endpoint(&request, &[addr("liar"), addr("stale")]), Some(addr("stale")));

    tokio::time::advance(DEFAULT_SANCTION_DURATION).await;
    assert_eq!(qos.select_endpoint(&request, &[addr("liar")]), Some(addr("liar")));
}

#[tokio::test(start_paused = true)]
async fn test_late_joiner_is_counted_once_it_catches_up() {
    let qos = create_evm_service("eth", 10);
    fleet().run_quality_checks(&qos);
    fleet().run_quality_checks(&qos);

    let caught_up = MockFleet::new(vec![MockEndpoint::new("stale", 100, 500)]);
    // The head probe is applied first, so the balance probe of the same round counts.
    caught_up.run_quality_checks(&qos);

    let consensus = qos.state().get_consensus_param(ARCHIVAL_BALANCE_CONSENSUS).unwrap();
    assert_eq!(consensus.get("500"), Some(&4));
}
