//! Host state machine and topology mirror tests over the in-memory
//! transport.

mod common;

use std::time::Duration;

use common::MockBroker;
use sparkplug_client::payload::REBIRTH_METRIC;
use sparkplug_client::{
    Host, HostConfig, HostState, MetricSnapshot, MetricValue, Payload, PayloadCodec,
};

fn test_host(broker: &MockBroker) -> Host {
    let config = HostConfig::new("mqtt://localhost:1883", "scada", "H1");
    Host::with_transport(config, broker.transport()).unwrap()
}

fn encode(metrics: Vec<MetricSnapshot>) -> Vec<u8> {
    PayloadCodec::default().encode_plain(&Payload::now(metrics))
}

fn metric(name: &str, value: MetricValue) -> MetricSnapshot {
    MetricSnapshot::new(name, value.datatype(), value)
}

#[tokio::test(start_paused = true)]
async fn test_connect_publishes_retained_online_with_offline_will() {
    let broker = MockBroker::new();
    let host = test_host(&broker);
    host.connect().await.unwrap();
    assert_eq!(host.state().await, HostState::Connected);

    let wills = broker.wills();
    assert_eq!(wills.len(), 1);
    assert_eq!(wills[0].topic, "STATE/H1");
    assert_eq!(wills[0].payload, b"OFFLINE");
    assert!(wills[0].retain);

    let frames = broker.published();
    assert_eq!(frames[0].topic, "STATE/H1");
    assert_eq!(frames[0].payload, b"ONLINE");
    assert!(frames[0].retain);
}

#[tokio::test(start_paused = true)]
async fn test_namespace_subscriptions() {
    let broker = MockBroker::new();
    let host = test_host(&broker);
    host.connect().await.unwrap();

    let subs = broker.subscriptions();
    for expected in [
        "STATE/#",
        "spBv1.0/+/NBIRTH/+",
        "spBv1.0/+/NCMD/+",
        "spBv1.0/+/NDEATH/+",
        "spBv1.0/+/DBIRTH/+/+",
        "spBv1.0/+/DCMD/+/+",
        "spBv1.0/+/DDEATH/+/+",
        "spBv1.0/+/NDATA/#",
        "spBv1.0/+/DDATA/#",
    ] {
        assert!(subs.contains(&expected.to_string()), "missing {expected}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_shared_subscription_group_wraps_data_filters() {
    let broker = MockBroker::new();
    let mut config = HostConfig::new("mqtt://localhost:1883", "scada", "H1");
    config.shared_subscription_group = Some("hosts".to_string());
    let host = Host::with_transport(config, broker.transport()).unwrap();
    host.connect().await.unwrap();

    let subs = broker.subscriptions();
    assert!(subs.contains(&"$share/hosts/spBv1.0/+/NDATA/#".to_string()));
    assert!(subs.contains(&"$share/hosts/spBv1.0/+/DDATA/#".to_string()));
    // Control topics stay exclusive.
    assert!(subs.contains(&"spBv1.0/+/NBIRTH/+".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_mirror_assembles_topology() {
    let broker = MockBroker::new();
    let host = test_host(&broker);
    host.connect().await.unwrap();

    broker
        .inject(
            "spBv1.0/G/NBIRTH/N",
            encode(vec![metric("m1", MetricValue::Int32(7))]),
        )
        .await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    let node = host.node_view("G", "N").await.unwrap();
    assert_eq!(node.metrics["m1"].value, MetricValue::Int32(7));

    broker
        .inject(
            "spBv1.0/G/DBIRTH/N/D",
            encode(vec![metric("m2", MetricValue::Boolean(true))]),
        )
        .await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    let node = host.node_view("G", "N").await.unwrap();
    assert!(node.devices["D"].metrics.contains_key("m2"));

    // NDATA merges by name, accepting names the birth never announced.
    broker
        .inject(
            "spBv1.0/G/NDATA/N",
            encode(vec![
                metric("m1", MetricValue::Int32(8)),
                metric("late", MetricValue::Int32(1)),
            ]),
        )
        .await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    let node = host.node_view("G", "N").await.unwrap();
    assert_eq!(node.metrics["m1"].value, MetricValue::Int32(8));
    assert!(node.metrics.contains_key("late"));
}

#[tokio::test(start_paused = true)]
async fn test_data_for_unknown_node_requests_one_rebirth() {
    let broker = MockBroker::new();
    let host = test_host(&broker);
    host.connect().await.unwrap();
    let before = broker.published().len();

    broker
        .inject(
            "spBv1.0/G/DDATA/N/D",
            encode(vec![
                metric("a", MetricValue::Int32(1)),
                metric("b", MetricValue::Int32(2)),
            ]),
        )
        .await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    let frames = broker.published();
    assert_eq!(frames.len(), before + 1, "exactly one rebirth per gap message");
    let rebirth = frames.last().unwrap();
    assert_eq!(rebirth.topic, "spBv1.0/G/NCMD/N");
    let payload = PayloadCodec::default().decode(&rebirth.payload).unwrap();
    assert_eq!(
        payload.metric(REBIRTH_METRIC).unwrap().value,
        MetricValue::Boolean(true)
    );
}

#[tokio::test(start_paused = true)]
async fn test_ddata_after_ndeath_requests_rebirth() {
    let broker = MockBroker::new();
    let host = test_host(&broker);
    host.connect().await.unwrap();

    broker
        .inject(
            "spBv1.0/G/NBIRTH/N",
            encode(vec![metric("m1", MetricValue::Int32(1))]),
        )
        .await;
    broker
        .inject(
            "spBv1.0/G/DBIRTH/N/D",
            encode(vec![metric("y", MetricValue::Boolean(true))]),
        )
        .await;
    broker.inject("spBv1.0/G/NDEATH/N", encode(vec![])).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(host.node_view("G", "N").await.is_none());
    let before = broker.published().len();

    broker
        .inject(
            "spBv1.0/G/DDATA/N/D",
            encode(vec![metric("y", MetricValue::Boolean(false))]),
        )
        .await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    let frames = broker.published();
    assert_eq!(frames.len(), before + 1);
    assert_eq!(frames.last().unwrap().topic, "spBv1.0/G/NCMD/N");
}

#[tokio::test(start_paused = true)]
async fn test_graceful_disconnect_publishes_offline() {
    let broker = MockBroker::new();
    let host = test_host(&broker);
    host.connect().await.unwrap();
    host.disconnect().await.unwrap();
    assert_eq!(host.state().await, HostState::Disconnected);

    let last = broker.published().last().cloned().unwrap();
    assert_eq!(last.topic, "STATE/H1");
    assert_eq!(last.payload, b"OFFLINE");
    assert!(last.retain);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_payload_does_not_disturb_state() {
    let broker = MockBroker::new();
    let host = test_host(&broker);
    host.connect().await.unwrap();

    broker
        .inject(
            "spBv1.0/G/NBIRTH/N",
            encode(vec![metric("m1", MetricValue::Int32(1))]),
        )
        .await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Garbage bytes: dropped with a warning, the mirror stays intact.
    broker
        .inject("spBv1.0/G/NDATA/N", vec![0xFF, 0xFF, 0xFF, 0xFF])
        .await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(host.state().await, HostState::Connected);
    let node = host.node_view("G", "N").await.unwrap();
    assert_eq!(node.metrics["m1"].value, MetricValue::Int32(1));
}

#[tokio::test(start_paused = true)]
async fn test_node_command_carries_host_seq() {
    let broker = MockBroker::new();
    let host = test_host(&broker);
    host.connect().await.unwrap();

    host.publish_node_command("G", "N", vec![metric("Node Control/Scan Rate", MetricValue::UInt64(500))])
        .await
        .unwrap();
    host.publish_device_command("G", "N", "D", vec![metric("setpoint", MetricValue::Double(4.2))])
        .await
        .unwrap();

    let frames = broker.published();
    let ncmd = &frames[frames.len() - 2];
    let dcmd = &frames[frames.len() - 1];
    assert_eq!(ncmd.topic, "spBv1.0/G/NCMD/N");
    assert_eq!(dcmd.topic, "spBv1.0/G/DCMD/N/D");

    let codec = PayloadCodec::default();
    assert_eq!(codec.decode(&ncmd.payload).unwrap().seq, Some(0));
    assert_eq!(codec.decode(&dcmd.payload).unwrap().seq, Some(1));
}
