//! Edge node state machine.
//!
//! An [`EdgeNode`] owns a set of metrics and devices and walks the
//! Sparkplug lifecycle: disconnected → connected-dead → connected-born.
//! All state lives behind one mutex; API calls, the transport event pump,
//! and scan timer ticks serialise through it, so transitions are atomic
//! with respect to external observers.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::device::{Device, DeviceSpec, DeviceState};
use crate::error::{Error, Result};
use crate::events::{EventBus, NodeEvent};
use crate::mqtt::{ConnectOptions, MqttTransport, QoS, Transport, TransportEvent, Will};
use crate::payload::{
    bd_seq_metric, rebirth_metric, MetricSnapshot, Payload, PayloadCodec, PayloadOptions,
    NODE_CONTROL_PREFIX, REBIRTH_METRIC,
};
use crate::scheduler;
use crate::sequence::{BdSeqCounter, SeqCounter};
use crate::topic::{device_topic, node_topic, MessageType, ParsedTopic, DEFAULT_VERSION};
use crate::types::{now_millis, Metric, MetricValue, ValueSource};

/// Edge node lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeState {
    /// No broker session.
    #[default]
    Disconnected,
    /// Session established, NBIRTH not yet published.
    ConnectedDead,
    /// Session established and born.
    ConnectedBorn,
}

/// Configuration for an edge node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// MQTT broker URL (e.g., "mqtt://localhost:1883").
    pub broker_url: String,
    /// Unique MQTT client identifier.
    pub client_id: String,
    /// Sparkplug group ID.
    pub group_id: String,
    /// Edge node identifier.
    pub edge_node_id: String,
    /// Optional MQTT username.
    pub username: Option<String>,
    /// Optional MQTT password.
    pub password: Option<String>,
    /// MQTT keepalive interval.
    pub keepalive: Duration,
    /// How long to wait for the broker CONNACK.
    pub connect_timeout: Duration,
    /// Sparkplug namespace version.
    pub version: String,
    /// Outbound payload encoding options.
    pub payload_options: PayloadOptions,
}

impl NodeConfig {
    /// Creates a node configuration with the library defaults.
    pub fn new(
        broker_url: impl Into<String>,
        client_id: impl Into<String>,
        group_id: impl Into<String>,
        edge_node_id: impl Into<String>,
    ) -> Self {
        Self {
            broker_url: broker_url.into(),
            client_id: client_id.into(),
            group_id: group_id.into(),
            edge_node_id: edge_node_id.into(),
            username: None,
            password: None,
            keepalive: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(30),
            version: DEFAULT_VERSION.to_string(),
            payload_options: PayloadOptions::default(),
        }
    }
}

struct NodeInner {
    config: NodeConfig,
    codec: PayloadCodec,
    transport: Box<dyn Transport>,
    state: NodeState,
    metrics: BTreeMap<String, Metric>,
    devices: BTreeMap<String, Device>,
    seq: SeqCounter,
    bd_seq: BdSeqCounter,
    scan_tasks: Vec<JoinHandle<()>>,
    pump_task: Option<JoinHandle<()>>,
}

/// A Sparkplug edge node.
///
/// # Example
///
/// ```no_run
/// use sparkplug_client::{DataType, EdgeNode, Metric, MetricValue, NodeConfig};
///
/// # async fn run() -> Result<(), sparkplug_client::Error> {
/// let config = NodeConfig::new("mqtt://localhost:1883", "gw01", "Energy", "Gateway01");
/// let node = EdgeNode::new(
///     config,
///     vec![Metric::new("Temperature", DataType::Double, MetricValue::Double(20.5))
///         .with_scan_rate(1_000)],
///     vec![],
/// )?;
///
/// // Connecting births the node and starts the scan timers.
/// node.connect().await?;
/// node.set_metric("Temperature", MetricValue::Double(21.0)).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct EdgeNode {
    inner: Arc<Mutex<NodeInner>>,
    events: EventBus<NodeEvent>,
}

impl EdgeNode {
    /// Creates an edge node backed by the rumqttc transport.
    pub fn new(
        config: NodeConfig,
        metrics: Vec<Metric>,
        devices: Vec<DeviceSpec>,
    ) -> Result<Self> {
        Self::with_transport(config, metrics, devices, Box::new(MqttTransport::new()))
    }

    /// Creates an edge node over a caller-supplied transport.
    pub fn with_transport(
        config: NodeConfig,
        metrics: Vec<Metric>,
        devices: Vec<DeviceSpec>,
        transport: Box<dyn Transport>,
    ) -> Result<Self> {
        if config.group_id.is_empty() {
            return Err(Error::Config("group_id must not be empty".to_string()));
        }
        if config.edge_node_id.is_empty() {
            return Err(Error::Config("edge_node_id must not be empty".to_string()));
        }

        let codec = PayloadCodec::new(config.payload_options);
        let inner = NodeInner {
            config,
            codec,
            transport,
            state: NodeState::Disconnected,
            metrics: metrics.into_iter().map(|m| (m.name.clone(), m)).collect(),
            devices: devices
                .into_iter()
                .map(|spec| (spec.id.clone(), Device::from_spec(spec)))
                .collect(),
            seq: SeqCounter::new(),
            bd_seq: BdSeqCounter::new(),
            scan_tasks: Vec::new(),
            pump_task: None,
        };

        Ok(Self {
            inner: Arc::new(Mutex::new(inner)),
            events: EventBus::default(),
        })
    }

    /// The event bus for this node.
    pub fn events(&self) -> &EventBus<NodeEvent> {
        &self.events
    }

    /// The current lifecycle state.
    pub async fn state(&self) -> NodeState {
        self.inner.lock().await.state
    }

    /// The sequence number the next DATA/BIRTH publish will carry.
    pub async fn seq(&self) -> u8 {
        self.inner.lock().await.seq.peek()
    }

    /// The birth/death sequence value pinned for the current session.
    pub async fn bd_seq(&self) -> Option<u8> {
        self.inner.lock().await.bd_seq.current()
    }

    /// Number of live scan timer tasks. Zero after `disconnect()`.
    pub async fn active_scan_tasks(&self) -> usize {
        self.inner.lock().await.scan_tasks.len()
    }

    /// Connects to the broker and births the node.
    ///
    /// Bumps `bdSeq`, registers the NDEATH will carrying the same value,
    /// subscribes to the NCMD/DCMD/STATE filters, and on CONNACK publishes
    /// the NBIRTH followed by a DBIRTH per device, then starts the scan
    /// timers.
    pub async fn connect(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state != NodeState::Disconnected {
            info!(state = ?inner.state, "connect ignored: already connected");
            return Ok(());
        }

        let bd_seq = inner.bd_seq.bump();
        let will_payload = inner.codec.encode_plain(&Payload {
            timestamp: Some(now_millis()),
            seq: None,
            uuid: None,
            body: None,
            metrics: vec![bd_seq_metric(bd_seq)],
        });
        let config = &inner.config;
        let will = Will {
            topic: node_topic(
                &config.version,
                &config.group_id,
                MessageType::NDeath,
                &config.edge_node_id,
            ),
            payload: will_payload,
            qos: QoS::AtMostOnce,
            retain: false,
        };
        let options = ConnectOptions {
            broker_url: config.broker_url.clone(),
            client_id: config.client_id.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            keepalive: config.keepalive,
            clean_session: true,
            connect_timeout: config.connect_timeout,
            will: Some(will),
        };

        let events = inner.transport.connect(options).await?;
        inner.state = NodeState::ConnectedDead;
        self.events.emit(NodeEvent::Connected);
        self.events.emit(NodeEvent::StateChanged(NodeState::ConnectedDead));

        let config = &inner.config;
        let ncmd_filter = node_topic(
            &config.version,
            &config.group_id,
            MessageType::NCmd,
            &config.edge_node_id,
        );
        let dcmd_filter = format!(
            "{}/{}/DCMD/{}/+",
            config.version, config.group_id, config.edge_node_id
        );
        inner
            .transport
            .subscribe(&ncmd_filter, QoS::AtLeastOnce)
            .await?;
        inner
            .transport
            .subscribe(&dcmd_filter, QoS::AtLeastOnce)
            .await?;
        inner.transport.subscribe("STATE/#", QoS::AtLeastOnce).await?;

        let pump = tokio::spawn(Self::pump(self.clone(), events));
        inner.pump_task = Some(pump);

        inner.birth(&self.inner, &self.events).await
    }

    /// Publishes the NBIRTH and births every device.
    ///
    /// Called automatically by `connect()`; a no-op outside connected-dead.
    pub async fn birth(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.birth(&self.inner, &self.events).await
    }

    /// Publishes an NDEATH and returns the node to connected-dead.
    pub async fn death(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.death(&self.events).await
    }

    /// Tears down the session: kills scan timers, publishes an NDEATH if
    /// born, closes the transport, and detaches the event pump.
    pub async fn disconnect(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state == NodeState::Disconnected {
            info!("disconnect ignored: not connected");
            return Ok(());
        }

        inner.stop_scan_tasks();
        if inner.state == NodeState::ConnectedBorn {
            inner.death(&self.events).await?;
        }
        inner.transport.disconnect().await?;
        if let Some(pump) = inner.pump_task.take() {
            pump.abort();
        }
        inner.state = NodeState::Disconnected;
        self.events.emit(NodeEvent::Disconnected);
        self.events.emit(NodeEvent::StateChanged(NodeState::Disconnected));
        Ok(())
    }

    /// Births a device (DBIRTH). A warned no-op unless the node is born
    /// and the device is dead.
    pub async fn device_birth(&self, device_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.device_birth(&self.events, device_id).await
    }

    /// Kills a device (DDEATH). A warned no-op unless the device is born.
    pub async fn device_death(&self, device_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.device_death(&self.events, device_id).await
    }

    /// Publishes an immediate NDATA with the given metrics.
    pub async fn publish_data(&self, metrics: Vec<MetricSnapshot>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state != NodeState::ConnectedBorn {
            warn!(state = ?inner.state, "refusing NDATA: node not born");
            return Ok(());
        }
        let payload = Payload::now(metrics);
        let now = payload.timestamp.unwrap_or_else(now_millis);
        let sent = payload.metrics.clone();
        inner
            .publish_sparkplug(&self.events, MessageType::NData, None, payload)
            .await?;
        scheduler::mark_published(&mut inner.metrics, &sent, now);
        Ok(())
    }

    /// Publishes an immediate DDATA for a device. Refused with a warning
    /// unless both the node and the device are born.
    pub async fn publish_device_data(
        &self,
        device_id: &str,
        metrics: Vec<MetricSnapshot>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state != NodeState::ConnectedBorn {
            warn!(state = ?inner.state, "refusing DDATA: node not born");
            return Ok(());
        }
        let Some(device) = inner.devices.get(device_id) else {
            return Err(Error::UnknownDevice(device_id.to_string()));
        };
        if device.state != DeviceState::Born {
            warn!(device = %device_id, "refusing DDATA: device not born");
            return Ok(());
        }
        let payload = Payload::now(metrics);
        let now = payload.timestamp.unwrap_or_else(now_millis);
        let sent = payload.metrics.clone();
        inner
            .publish_sparkplug(&self.events, MessageType::DData, Some(device_id), payload)
            .await?;
        if let Some(device) = inner.devices.get_mut(device_id) {
            scheduler::mark_published(&mut device.metrics, &sent, now);
        }
        Ok(())
    }

    /// Updates a node metric's stored scalar value.
    pub async fn set_metric(&self, name: &str, value: MetricValue) -> Result<()> {
        let mut inner = self.inner.lock().await;
        match inner.metrics.get_mut(name) {
            Some(metric) => {
                metric.value = ValueSource::Value(value);
                Ok(())
            }
            None => Err(Error::UnknownMetric(name.to_string())),
        }
    }

    /// Updates a device metric's stored scalar value.
    pub async fn set_device_metric(
        &self,
        device_id: &str,
        name: &str,
        value: MetricValue,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let Some(device) = inner.devices.get_mut(device_id) else {
            return Err(Error::UnknownDevice(device_id.to_string()));
        };
        match device.metrics.get_mut(name) {
            Some(metric) => {
                metric.value = ValueSource::Value(value);
                Ok(())
            }
            None => Err(Error::UnknownMetric(name.to_string())),
        }
    }

    /// Attaches a device after construction. The device starts dead;
    /// birth it explicitly. Scan timers pick up new rates on next birth.
    pub async fn add_device(&self, spec: DeviceSpec) {
        let mut inner = self.inner.lock().await;
        inner
            .devices
            .insert(spec.id.clone(), Device::from_spec(spec));
    }

    async fn pump(
        node: EdgeNode,
        mut events: tokio::sync::mpsc::Receiver<TransportEvent>,
    ) {
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Connected => {}
                TransportEvent::Message { topic, payload } => {
                    node.handle_message(topic, payload).await;
                }
                TransportEvent::Disconnected => {
                    node.events.emit(NodeEvent::Disconnected);
                }
                TransportEvent::Error(details) => {
                    node.events.emit(NodeEvent::Error(details));
                }
                TransportEvent::Closed => {
                    let mut inner = node.inner.lock().await;
                    inner.stop_scan_tasks();
                    inner.pump_task = None;
                    inner.state = NodeState::Disconnected;
                    for device in inner.devices.values_mut() {
                        device.state = DeviceState::Dead;
                    }
                    drop(inner);
                    node.events.emit(NodeEvent::Closed);
                    node.events
                        .emit(NodeEvent::StateChanged(NodeState::Disconnected));
                    break;
                }
            }
        }
    }

    async fn handle_message(&self, topic: String, bytes: Vec<u8>) {
        self.events.emit(NodeEvent::Message {
            topic: topic.clone(),
            payload: bytes.clone(),
        });

        let parsed = match ParsedTopic::parse(&topic) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(topic = %topic, error = %e, "ignoring unparseable topic");
                return;
            }
        };

        let ParsedTopic::Sparkplug {
            message_type,
            device_id,
            ..
        } = parsed
        else {
            // STATE traffic is surfaced via the raw Message event only.
            return;
        };

        match message_type {
            MessageType::NCmd => {
                let payload = {
                    let inner = self.inner.lock().await;
                    match inner.codec.decode(&bytes) {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!(topic = %topic, error = %e, "dropping undecodable NCMD");
                            return;
                        }
                    }
                };
                self.events.emit(NodeEvent::Ncmd(payload.clone()));
                self.dispatch_node_commands(&payload);
            }
            MessageType::DCmd => {
                let Some(device_id) = device_id else {
                    return;
                };
                let payload = {
                    let inner = self.inner.lock().await;
                    match inner.codec.decode(&bytes) {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!(topic = %topic, error = %e, "dropping undecodable DCMD");
                            return;
                        }
                    }
                };
                // DCMD interpretation belongs to the application.
                self.events.emit(NodeEvent::Dcmd { device_id, payload });
            }
            _ => {}
        }
    }

    fn dispatch_node_commands(&self, payload: &Payload) {
        for metric in &payload.metrics {
            let Some(name) = metric.name.as_deref() else {
                continue;
            };
            if !name.starts_with(NODE_CONTROL_PREFIX) {
                continue;
            }
            if name == REBIRTH_METRIC {
                if metric.value == MetricValue::Boolean(true) {
                    info!("rebirth requested");
                    let node = self.clone();
                    // Runs outside the pump task: the teardown below aborts
                    // the pump, which must not cancel its own handler.
                    tokio::spawn(async move {
                        if let Err(e) = node.rebirth().await {
                            warn!(error = %e, "rebirth failed");
                            node.events.emit(NodeEvent::Error(e.to_string()));
                        }
                    });
                }
            } else {
                warn!(command = %name, "ignoring unknown node control command");
            }
        }
    }

    /// Full re-announce cycle: death, disconnect, fresh session, birth.
    pub async fn rebirth(&self) -> Result<()> {
        self.disconnect().await?;
        self.connect().await
    }
}

impl NodeInner {
    async fn birth(
        &mut self,
        arc: &Arc<Mutex<NodeInner>>,
        events: &EventBus<NodeEvent>,
    ) -> Result<()> {
        if self.state != NodeState::ConnectedDead {
            info!(state = ?self.state, "birth ignored");
            return Ok(());
        }

        let now = now_millis();
        let mut snapshots = vec![
            rebirth_metric(false),
            bd_seq_metric(self.bd_seq.current().unwrap_or(0)),
        ];
        for metric in self.metrics.values() {
            let value = metric.value.evaluate().await;
            let mut snapshot =
                MetricSnapshot::new(metric.name.clone(), metric.datatype, value)
                    .with_timestamp(now);
            snapshot.properties = metric.properties.clone();
            snapshots.push(snapshot);
        }

        self.seq.reset();
        let payload = Payload {
            timestamp: Some(now),
            seq: None,
            uuid: None,
            body: None,
            metrics: snapshots,
        };
        let sent = payload.metrics.clone();
        self.publish_sparkplug(events, MessageType::NBirth, None, payload)
            .await?;
        scheduler::mark_published(&mut self.metrics, &sent, now);

        self.state = NodeState::ConnectedBorn;
        events.emit(NodeEvent::StateChanged(NodeState::ConnectedBorn));

        let device_ids: Vec<String> = self.devices.keys().cloned().collect();
        for device_id in device_ids {
            if self.devices[&device_id].state == DeviceState::Born {
                self.device_death(events, &device_id).await?;
            }
            self.device_birth(events, &device_id).await?;
        }

        self.start_scan_tasks(arc, events);
        Ok(())
    }

    async fn death(&mut self, events: &EventBus<NodeEvent>) -> Result<()> {
        if self.state != NodeState::ConnectedBorn {
            info!(state = ?self.state, "death ignored");
            return Ok(());
        }

        self.stop_scan_tasks();
        let payload = Payload {
            timestamp: Some(now_millis()),
            seq: None,
            uuid: None,
            body: None,
            metrics: vec![bd_seq_metric(self.bd_seq.current().unwrap_or(0))],
        };
        self.publish_sparkplug(events, MessageType::NDeath, None, payload)
            .await?;

        // Devices die implicitly with the node; no DDEATH goes out.
        for device in self.devices.values_mut() {
            device.state = DeviceState::Dead;
        }
        self.state = NodeState::ConnectedDead;
        events.emit(NodeEvent::StateChanged(NodeState::ConnectedDead));
        Ok(())
    }

    async fn device_birth(
        &mut self,
        events: &EventBus<NodeEvent>,
        device_id: &str,
    ) -> Result<()> {
        if self.state != NodeState::ConnectedBorn {
            warn!(device = %device_id, "ignoring device birth: node not born");
            return Ok(());
        }
        let Some(device) = self.devices.get_mut(device_id) else {
            return Err(Error::UnknownDevice(device_id.to_string()));
        };
        if !device.try_birth() {
            return Ok(());
        }

        let now = now_millis();
        let mut snapshots = Vec::with_capacity(device.metrics.len());
        for metric in device.metrics.values() {
            let value = metric.value.evaluate().await;
            let mut snapshot =
                MetricSnapshot::new(metric.name.clone(), metric.datatype, value)
                    .with_timestamp(now);
            snapshot.properties = metric.properties.clone();
            snapshots.push(snapshot);
        }

        let payload = Payload {
            timestamp: Some(now),
            seq: None,
            uuid: None,
            body: None,
            metrics: snapshots,
        };
        let sent = payload.metrics.clone();
        self.publish_sparkplug(events, MessageType::DBirth, Some(device_id), payload)
            .await?;
        if let Some(device) = self.devices.get_mut(device_id) {
            scheduler::mark_published(&mut device.metrics, &sent, now);
        }
        Ok(())
    }

    async fn device_death(
        &mut self,
        events: &EventBus<NodeEvent>,
        device_id: &str,
    ) -> Result<()> {
        let Some(device) = self.devices.get_mut(device_id) else {
            return Err(Error::UnknownDevice(device_id.to_string()));
        };
        if !device.try_death() {
            return Ok(());
        }

        let payload = Payload {
            timestamp: Some(now_millis()),
            seq: None,
            uuid: None,
            body: None,
            metrics: Vec::new(),
        };
        self.publish_sparkplug(events, MessageType::DDeath, Some(device_id), payload)
            .await
    }

    async fn scan_tick(&mut self, events: &EventBus<NodeEvent>, scan_rate: u64) -> Result<()> {
        let now = now_millis();

        let due = scheduler::collect_due(&self.metrics, scan_rate, now).await;
        if !due.is_empty() {
            let payload = Payload {
                timestamp: Some(now),
                seq: None,
                uuid: None,
                body: None,
                metrics: due.clone(),
            };
            self.publish_sparkplug(events, MessageType::NData, None, payload)
                .await?;
            scheduler::mark_published(&mut self.metrics, &due, now);
        }

        let device_ids: Vec<String> = self.devices.keys().cloned().collect();
        for device_id in device_ids {
            let due = {
                let device = &self.devices[&device_id];
                if device.state != DeviceState::Born {
                    continue;
                }
                scheduler::collect_due(&device.metrics, scan_rate, now).await
            };
            if due.is_empty() {
                continue;
            }
            let payload = Payload {
                timestamp: Some(now),
                seq: None,
                uuid: None,
                body: None,
                metrics: due.clone(),
            };
            self.publish_sparkplug(events, MessageType::DData, Some(&device_id), payload)
                .await?;
            if let Some(device) = self.devices.get_mut(&device_id) {
                scheduler::mark_published(&mut device.metrics, &due, now);
            }
        }
        Ok(())
    }

    /// Frames and publishes one Sparkplug message, assigning the sequence
    /// number (NDEATH carries none and is never compressed).
    async fn publish_sparkplug(
        &mut self,
        events: &EventBus<NodeEvent>,
        message_type: MessageType,
        device_id: Option<&str>,
        mut payload: Payload,
    ) -> Result<()> {
        let config = &self.config;
        let topic = match device_id {
            Some(device_id) => device_topic(
                &config.version,
                &config.group_id,
                message_type,
                &config.edge_node_id,
                device_id,
            ),
            None => node_topic(
                &config.version,
                &config.group_id,
                message_type,
                &config.edge_node_id,
            ),
        };

        let bytes = if message_type == MessageType::NDeath {
            payload.seq = None;
            self.codec.encode_plain(&payload)
        } else {
            payload.seq = Some(self.seq.next() as u64);
            self.codec.encode(&payload)?
        };

        self.transport
            .publish(&topic, bytes, QoS::AtMostOnce, false)
            .await?;
        debug!(topic = %topic, seq = ?payload.seq, "published {}", message_type);
        events.emit(NodeEvent::Published {
            message_type,
            topic,
            payload,
        });
        Ok(())
    }

    fn start_scan_tasks(&mut self, arc: &Arc<Mutex<NodeInner>>, events: &EventBus<NodeEvent>) {
        self.stop_scan_tasks();

        let mut rates = scheduler::distinct_scan_rates(self.metrics.values());
        for device in self.devices.values() {
            rates.extend(scheduler::distinct_scan_rates(device.metrics.values()));
        }

        for rate in rates {
            let arc = arc.clone();
            let events = events.clone();
            let handle = tokio::spawn(async move {
                let period = Duration::from_millis(rate.max(1));
                let mut interval =
                    tokio::time::interval_at(tokio::time::Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    interval.tick().await;
                    let mut inner = arc.lock().await;
                    if inner.state != NodeState::ConnectedBorn {
                        continue;
                    }
                    if let Err(e) = inner.scan_tick(&events, rate).await {
                        warn!(scan_rate = rate, error = %e, "scan tick publish failed");
                    }
                }
            });
            self.scan_tasks.push(handle);
        }
    }

    fn stop_scan_tasks(&mut self) {
        for task in self.scan_tasks.drain(..) {
            task.abort();
        }
    }
}
