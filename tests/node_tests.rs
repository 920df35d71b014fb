//! Edge node lifecycle tests over the in-memory transport.

mod common;

use std::time::Duration;

use common::MockBroker;
use sparkplug_client::payload::{rebirth_metric, BDSEQ_METRIC, REBIRTH_METRIC};
use sparkplug_client::{
    DataType, DeviceSpec, EdgeNode, Metric, MetricValue, NodeConfig, NodeState, Payload,
    PayloadCodec,
};

fn test_node(broker: &MockBroker) -> EdgeNode {
    let config = NodeConfig::new("mqtt://localhost:1883", "client", "G", "N");
    EdgeNode::with_transport(
        config,
        vec![Metric::new("x", DataType::Int32, MetricValue::Int32(0)).with_scan_rate(1_000)],
        vec![DeviceSpec::new("D").with_metric(
            Metric::new("y", DataType::Boolean, MetricValue::Boolean(true)).with_scan_rate(1_000),
        )],
        broker.transport(),
    )
    .unwrap()
}

fn decode(frame: &common::PublishedFrame) -> Payload {
    PayloadCodec::default().decode(&frame.payload).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_connect_births_node_then_devices() {
    let broker = MockBroker::new();
    let node = test_node(&broker);

    node.connect().await.unwrap();
    assert_eq!(node.state().await, NodeState::ConnectedBorn);

    let frames = broker.published();
    assert_eq!(frames.len(), 2, "expected exactly NBIRTH then DBIRTH");

    assert_eq!(frames[0].topic, "spBv1.0/G/NBIRTH/N");
    let nbirth = decode(&frames[0]);
    assert_eq!(nbirth.seq, Some(0));
    assert_eq!(
        nbirth.metric(BDSEQ_METRIC).unwrap().value,
        MetricValue::UInt64(0)
    );
    assert_eq!(
        nbirth.metric(REBIRTH_METRIC).unwrap().value,
        MetricValue::Boolean(false)
    );
    assert_eq!(nbirth.metric("x").unwrap().value, MetricValue::Int32(0));

    assert_eq!(frames[1].topic, "spBv1.0/G/DBIRTH/N/D");
    let dbirth = decode(&frames[1]);
    assert_eq!(dbirth.seq, Some(1));
    assert_eq!(dbirth.metric("y").unwrap().value, MetricValue::Boolean(true));

    // The will registered for the session carries the NBIRTH's bdSeq.
    let wills = broker.wills();
    assert_eq!(wills.len(), 1);
    assert_eq!(wills[0].topic, "spBv1.0/G/NDEATH/N");
    let will = PayloadCodec::default().decode(&wills[0].payload).unwrap();
    assert_eq!(will.seq, None);
    assert_eq!(
        will.metric(BDSEQ_METRIC).unwrap().value,
        MetricValue::UInt64(0)
    );
}

#[tokio::test(start_paused = true)]
async fn test_unchanged_values_are_suppressed_then_change_publishes() {
    let broker = MockBroker::new();
    let node = test_node(&broker);
    node.connect().await.unwrap();
    assert_eq!(broker.published().len(), 2);

    // One full scan period with nothing changed: no publish.
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    assert_eq!(broker.published().len(), 2);

    node.set_metric("x", MetricValue::Int32(1)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1_000)).await;

    let frames = broker.published();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[2].topic, "spBv1.0/G/NDATA/N");
    let ndata = decode(&frames[2]);
    assert_eq!(ndata.seq, Some(2));
    assert_eq!(ndata.metric("x").unwrap().value, MetricValue::Int32(1));
}

#[tokio::test(start_paused = true)]
async fn test_rebirth_on_ncmd() {
    let broker = MockBroker::new();
    let node = test_node(&broker);
    node.connect().await.unwrap();
    assert_eq!(node.bd_seq().await, Some(0));

    let codec = PayloadCodec::default();
    let command = codec.encode_plain(&Payload::now(vec![rebirth_metric(true)]));
    broker.inject("spBv1.0/G/NCMD/N", command).await;

    // Let the pump dispatch and the rebirth task run to completion.
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(node.state().await, NodeState::ConnectedBorn);
    assert_eq!(node.bd_seq().await, Some(1));
    assert_eq!(broker.connect_count(), 2);

    let frames = broker.published();
    // NBIRTH, DBIRTH, then NDEATH + fresh NBIRTH + DBIRTH.
    assert_eq!(frames.len(), 5);
    assert_eq!(frames[2].topic, "spBv1.0/G/NDEATH/N");
    let ndeath = decode(&frames[2]);
    assert_eq!(ndeath.seq, None, "NDEATH carries no seq");
    assert_eq!(
        ndeath.metric(BDSEQ_METRIC).unwrap().value,
        MetricValue::UInt64(0)
    );

    assert_eq!(frames[3].topic, "spBv1.0/G/NBIRTH/N");
    let nbirth = decode(&frames[3]);
    assert_eq!(nbirth.seq, Some(0), "NBIRTH resets seq");
    assert_eq!(
        nbirth.metric(BDSEQ_METRIC).unwrap().value,
        MetricValue::UInt64(1),
        "fresh session increments bdSeq"
    );

    assert_eq!(frames[4].topic, "spBv1.0/G/DBIRTH/N/D");

    // The second session's will matches the second NBIRTH.
    let wills = broker.wills();
    assert_eq!(wills.len(), 2);
    let will = codec.decode(&wills[1].payload).unwrap();
    assert_eq!(
        will.metric(BDSEQ_METRIC).unwrap().value,
        MetricValue::UInt64(1)
    );
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_stops_scan_timers() {
    let broker = MockBroker::new();
    let node = test_node(&broker);
    node.connect().await.unwrap();
    assert_eq!(node.active_scan_tasks().await, 1);

    node.disconnect().await.unwrap();
    assert_eq!(node.state().await, NodeState::Disconnected);
    assert_eq!(node.active_scan_tasks().await, 0);

    // The graceful teardown published an NDEATH before closing.
    let frames = broker.published();
    assert_eq!(frames.last().unwrap().topic, "spBv1.0/G/NDEATH/N");

    // No timer survives: nothing further is published.
    tokio::time::sleep(Duration::from_millis(3_000)).await;
    assert_eq!(broker.published().len(), frames.len());
}

#[tokio::test(start_paused = true)]
async fn test_subscriptions_on_connect() {
    let broker = MockBroker::new();
    let node = test_node(&broker);
    node.connect().await.unwrap();

    let subs = broker.subscriptions();
    assert!(subs.contains(&"spBv1.0/G/NCMD/N".to_string()));
    assert!(subs.contains(&"spBv1.0/G/DCMD/N/+".to_string()));
    assert!(subs.contains(&"STATE/#".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_publish_device_data_refused_unless_born() {
    let broker = MockBroker::new();
    let node = test_node(&broker);

    // Not connected: refused with a warning, no frame, state unchanged.
    node.publish_device_data("D", vec![]).await.unwrap();
    assert!(broker.published().is_empty());

    node.connect().await.unwrap();
    node.device_death("D").await.unwrap();
    let before = broker.published().len();

    // Device dead: refused again.
    node.publish_device_data("D", vec![]).await.unwrap();
    assert_eq!(broker.published().len(), before);

    // Unknown devices are an error, not a silent no-op.
    assert!(node.publish_device_data("nope", vec![]).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_transport_failure_returns_node_to_disconnected() {
    let broker = MockBroker::new();
    let node = test_node(&broker);
    node.connect().await.unwrap();

    broker.fail("connection reset").await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(node.state().await, NodeState::Disconnected);
    assert_eq!(node.active_scan_tasks().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_producer_metric_is_evaluated_at_publish_time() {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    let counter = Arc::new(AtomicI32::new(0));
    let producer = {
        let counter = counter.clone();
        Arc::new(move || MetricValue::Int32(counter.fetch_add(1, Ordering::SeqCst)))
    };

    let broker = MockBroker::new();
    let config = NodeConfig::new("mqtt://localhost:1883", "client", "G", "N");
    let node = EdgeNode::with_transport(
        config,
        vec![Metric::producer("tick", DataType::Int32, producer).with_scan_rate(500)],
        vec![],
        broker.transport(),
    )
    .unwrap();

    node.connect().await.unwrap();
    let nbirth = decode(&broker.published()[0]);
    assert_eq!(nbirth.metric("tick").unwrap().value, MetricValue::Int32(0));

    // Each scan evaluates the producer anew; the changed value publishes.
    tokio::time::sleep(Duration::from_millis(600)).await;
    let frames = broker.published();
    assert_eq!(frames.len(), 2);
    let ndata = decode(&frames[1]);
    assert_eq!(ndata.metric("tick").unwrap().value, MetricValue::Int32(1));
}
