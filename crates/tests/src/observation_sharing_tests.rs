//! Integration tests for sharing observations between engine instances.
//!
//! Two gateway instances run in one process and share a `LocalBus`. Only the first instance
//! talks to endpoints; the second must converge to the same service state purely from the
//! observations it receives.

use crate::mock_infrastructure::{
    create_default_service, create_evm_service, create_journal, wait_for, MockEndpoint, MockFleet,
};
use qos_core::{
    errors::QosError,
    evm::{ARCHIVAL_BALANCE_CONSENSUS, ARCHIVAL_BLOCK_NUMBER, PERCEIVED_BLOCK_NUMBER},
    observation::{LocalBus, Messenger, MessengerError, ObservationBus, QosObservations},
    qos::{ServiceQos, ServiceQosRegistry},
    types::EndpointAddr,
};
use std::{sync::Arc, time::Duration};
use tokio::sync::broadcast;

const TOPIC_PREFIX: &str = "qos.observations";

struct Instance {
    qos: Arc<ServiceQos>,
    messenger: Arc<Messenger>,
}

fn instance(bus: &Arc<LocalBus>, qos: Arc<ServiceQos>) -> Instance {
    let registry = Arc::new(ServiceQosRegistry::new());
    registry.register(Arc::clone(&qos));
    let bus: Arc<dyn ObservationBus> = bus.clone();
    Instance { qos, messenger: Arc::new(Messenger::new(bus, registry, TOPIC_PREFIX)) }
}

#[tokio::test]
async fn test_remote_instance_converges_on_consensus() {
    let bus = Arc::new(LocalBus::default());
    let local = instance(&bus, create_evm_service("eth", 10));
    let remote = instance(&bus, create_evm_service("eth", 10));

    let (shutdown_tx, _) = broadcast::channel(1);
    let listener = Arc::clone(&remote.messenger).start(shutdown_tx.subscribe()).await.unwrap();
    assert_eq!(bus.subscriber_count("qos.observations.eth"), 1);

    let fleet = MockFleet::new(vec![
        MockEndpoint::new("a", 100, 500),
        MockEndpoint::new("b", 100, 500),
        MockEndpoint::new("c", 100, 500),
        MockEndpoint::new("liar", 100, 7),
    ]);
    let mut published = fleet.run_quality_checks(&local.qos);
    published.extend(fleet.run_quality_checks(&local.qos));
    for observations in &published {
        local.messenger.publish(observations).await.unwrap();
    }

    let expected = local.qos.state().get_consensus_param(ARCHIVAL_BALANCE_CONSENSUS);
    assert!(expected.is_some());
    let converged = wait_for(Duration::from_secs(5), || {
        remote.qos.state().get_consensus_param(ARCHIVAL_BALANCE_CONSENSUS) == expected
    })
    .await;
    assert!(converged, "remote instance did not converge");

    for param in [PERCEIVED_BLOCK_NUMBER, ARCHIVAL_BLOCK_NUMBER] {
        assert_eq!(
            remote.qos.state().get_int_param(param),
            local.qos.state().get_int_param(param),
            "{param}"
        );
    }
    assert_eq!(remote.qos.state().endpoint_count(), 4);
    let liar = remote.qos.state().endpoint(&EndpointAddr::new("liar")).unwrap();
    assert!(liar.active_sanction().is_some());

    shutdown_tx.send(()).unwrap();
    listener.await.unwrap();
}

#[tokio::test]
async fn test_instance_listening_to_own_topic_counts_once() {
    let bus = Arc::new(LocalBus::default());
    let node = instance(&bus, create_evm_service("eth", 10));
    let peer = instance(&bus, create_evm_service("eth", 10));

    let (shutdown_tx, _) = broadcast::channel(1);
    let listener = Arc::clone(&node.messenger).start(shutdown_tx.subscribe()).await.unwrap();

    let fleet = MockFleet::new(vec![
        MockEndpoint::new("a", 100, 500),
        MockEndpoint::new("b", 100, 500),
        MockEndpoint::new("c", 100, 500),
    ]);
    let mut published = fleet.run_quality_checks(&node.qos);
    published.extend(fleet.run_quality_checks(&node.qos));
    let expected = node.qos.state().get_consensus_param(ARCHIVAL_BALANCE_CONSENSUS);
    assert!(expected.is_some());
    for observations in &published {
        node.messenger.publish(observations).await.unwrap();
    }

    // Queued behind the echoes of everything published above.
    let marker = QosObservations::from(&create_journal("eth", "eth_chainId", "marker", &[]));
    peer.messenger.publish(&marker).await.unwrap();
    let drained = wait_for(Duration::from_secs(5), || {
        node.qos.state().endpoint(&EndpointAddr::new("marker")).is_some()
    })
    .await;
    assert!(drained, "listener did not reach the peer's message");

    assert_eq!(node.qos.state().get_consensus_param(ARCHIVAL_BALANCE_CONSENSUS), expected);

    shutdown_tx.send(()).unwrap();
    listener.await.unwrap();
}

#[tokio::test]
async fn test_listener_survives_bad_messages() {
    let bus = Arc::new(LocalBus::default());
    let local = instance(&bus, create_default_service("eth", 16));
    let remote = instance(&bus, create_default_service("eth", 16));

    let (shutdown_tx, _) = broadcast::channel(1);
    let listener = Arc::clone(&remote.messenger).start(shutdown_tx.subscribe()).await.unwrap();

    bus.publish("qos.observations.eth", bytes::Bytes::from_static(b"not an observation"))
        .await
        .unwrap();
    let mut wrong_service =
        QosObservations::from(&create_journal("eth", "eth_chainId", "intruder", &[]));
    wrong_service.service_name = "polygon".to_string();
    bus.publish("qos.observations.eth", wrong_service.to_bytes().unwrap()).await.unwrap();

    let journal = create_journal("eth", "eth_chainId", "node-1", &[]);
    local.messenger.publish(&QosObservations::from(&journal)).await.unwrap();

    let applied =
        wait_for(Duration::from_secs(5), || remote.qos.state().endpoint_count() == 1).await;
    assert!(applied, "valid message after bad ones was not applied");
    assert!(remote.qos.state().endpoint(&EndpointAddr::new("node-1")).is_some());
    assert!(remote.qos.state().endpoint(&EndpointAddr::new("intruder")).is_none());

    shutdown_tx.send(()).unwrap();
    listener.await.unwrap();
}

#[test]
fn test_observation_for_other_service_is_rejected() {
    let qos = create_default_service("eth", 16);
    let observations =
        QosObservations::from(&create_journal("polygon", "eth_chainId", "node-1", &[]));

    let err = qos.apply_observations(&observations).unwrap_err();
    assert!(matches!(err, QosError::ServiceMismatch { .. }));
    assert_eq!(qos.state().endpoint_count(), 0);
}

#[test]
fn test_unregistered_service_is_reported() {
    let bus = Arc::new(LocalBus::default());
    let remote = instance(&bus, create_default_service("eth", 16));
    let observations =
        QosObservations::from(&create_journal("polygon", "eth_chainId", "node-1", &[]));

    let err = remote.messenger.handle_message(&observations.to_bytes().unwrap()).unwrap_err();
    assert!(matches!(err, MessengerError::UnknownService(name) if name == "polygon"));
}

#[test]
fn test_duplicate_delivery_is_applied_twice() {
    let qos = create_evm_service("eth", 10);
    for addr in ["a", "b"] {
        qos.apply_journal(&create_journal(
            "eth",
            "eth_blockNumber",
            addr,
            &[("block_number", 100)],
        ))
        .unwrap();
    }

    let fleet = MockFleet::new(vec![MockEndpoint::new("a", 100, 500)]);
    let published = fleet.run_quality_checks(&qos);
    let balance = published
        .iter()
        .find(|o| o.request.as_ref().is_some_and(|r| r.method == "eth_getBalance"))
        .unwrap();

    qos.apply_observations(balance).unwrap();

    let consensus = qos.state().get_consensus_param(ARCHIVAL_BALANCE_CONSENSUS).unwrap();
    assert_eq!(consensus.get("500"), Some(&2));
}
