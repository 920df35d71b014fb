//! Host application state machine.
//!
//! A [`Host`] declares itself on the retained `STATE/<primary_host_id>`
//! topic, subscribes to the Sparkplug namespace, assembles the topology
//! mirror from everything it observes, and requests rebirths when its view
//! desynchronises from a node.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::events::{EventBus, HostEvent, SparkplugMessage};
use crate::mirror::{GroupExport, MirrorOutcome, NodeView, TopologyMirror};
use crate::mqtt::{
    shared_filter, ConnectOptions, MqttTransport, QoS, Transport, TransportEvent, Will,
};
use crate::payload::{rebirth_metric, MetricSnapshot, Payload, PayloadCodec, PayloadOptions};
use crate::sequence::SeqCounter;
use crate::topic::{
    device_topic, node_topic, state_topic, MessageType, ParsedTopic, DEFAULT_VERSION,
};
use crate::types::now_millis;

/// STATE payload announcing the host is online.
const STATE_ONLINE: &[u8] = b"ONLINE";

/// STATE payload announcing the host is offline.
const STATE_OFFLINE: &[u8] = b"OFFLINE";

/// Host lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostState {
    /// No broker session.
    #[default]
    Disconnected,
    /// Session established, STATE=ONLINE published.
    Connected,
}

/// Configuration for a host application.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// MQTT broker URL (e.g., "mqtt://localhost:1883").
    pub broker_url: String,
    /// Unique MQTT client identifier.
    pub client_id: String,
    /// Primary host identity used in the STATE topic.
    pub primary_host_id: String,
    /// Optional MQTT username.
    pub username: Option<String>,
    /// Optional MQTT password.
    pub password: Option<String>,
    /// MQTT keepalive interval.
    pub keepalive: Duration,
    /// How long to wait for the broker CONNACK.
    pub connect_timeout: Duration,
    /// Sparkplug namespace version to subscribe under.
    pub version: String,
    /// When set, NDATA/DDATA filters are wrapped as
    /// `$share/<group>/<filter>` for broker-shared delivery.
    pub shared_subscription_group: Option<String>,
    /// Encoding options for the commands this host publishes.
    pub payload_options: PayloadOptions,
}

impl HostConfig {
    /// Creates a host configuration with the library defaults.
    pub fn new(
        broker_url: impl Into<String>,
        client_id: impl Into<String>,
        primary_host_id: impl Into<String>,
    ) -> Self {
        Self {
            broker_url: broker_url.into(),
            client_id: client_id.into(),
            primary_host_id: primary_host_id.into(),
            username: None,
            password: None,
            keepalive: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(30),
            version: DEFAULT_VERSION.to_string(),
            shared_subscription_group: None,
            payload_options: PayloadOptions::default(),
        }
    }
}

struct HostInner {
    config: HostConfig,
    codec: PayloadCodec,
    transport: Box<dyn Transport>,
    state: HostState,
    mirror: TopologyMirror,
    seq: SeqCounter,
    pump_task: Option<tokio::task::JoinHandle<()>>,
}

/// A Sparkplug host application.
///
/// # Example
///
/// ```no_run
/// use sparkplug_client::{Host, HostConfig};
///
/// # async fn run() -> Result<(), sparkplug_client::Error> {
/// let host = Host::new(HostConfig::new(
///     "mqtt://localhost:1883",
///     "scada01",
///     "ScadaHost01",
/// ))?;
/// host.connect().await?;
///
/// // The mirror fills up as births and data arrive.
/// for group in host.topology().await {
///     println!("group {} has {} nodes", group.id, group.nodes.len());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Host {
    inner: Arc<Mutex<HostInner>>,
    events: EventBus<HostEvent>,
}

impl Host {
    /// Creates a host backed by the rumqttc transport.
    pub fn new(config: HostConfig) -> Result<Self> {
        Self::with_transport(config, Box::new(MqttTransport::new()))
    }

    /// Creates a host over a caller-supplied transport.
    pub fn with_transport(config: HostConfig, transport: Box<dyn Transport>) -> Result<Self> {
        if config.primary_host_id.is_empty() {
            return Err(Error::Config("primary_host_id must not be empty".to_string()));
        }

        let codec = PayloadCodec::new(config.payload_options);
        let inner = HostInner {
            config,
            codec,
            transport,
            state: HostState::Disconnected,
            mirror: TopologyMirror::new(),
            seq: SeqCounter::new(),
            pump_task: None,
        };

        Ok(Self {
            inner: Arc::new(Mutex::new(inner)),
            events: EventBus::default(),
        })
    }

    /// The event bus for this host.
    pub fn events(&self) -> &EventBus<HostEvent> {
        &self.events
    }

    /// The current lifecycle state.
    pub async fn state(&self) -> HostState {
        self.inner.lock().await.state
    }

    /// Flatten-for-export projection of the topology mirror.
    pub async fn topology(&self) -> Vec<GroupExport> {
        self.inner.lock().await.mirror.flatten()
    }

    /// A snapshot of one mirrored node, if observed.
    pub async fn node_view(&self, group_id: &str, edge_node_id: &str) -> Option<NodeView> {
        self.inner
            .lock()
            .await
            .mirror
            .node(group_id, edge_node_id)
            .cloned()
    }

    /// Connects to the broker, publishes retained `ONLINE`, and subscribes
    /// to the Sparkplug namespace.
    ///
    /// The session registers a retained `OFFLINE` will so the broker
    /// announces the host's death on ungraceful disconnect.
    pub async fn connect(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state != HostState::Disconnected {
            info!("connect ignored: already connected");
            return Ok(());
        }

        let config = &inner.config;
        let topic = state_topic(&config.primary_host_id);
        let will = Will {
            topic: topic.clone(),
            payload: STATE_OFFLINE.to_vec(),
            qos: QoS::AtMostOnce,
            retain: true,
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
        inner.state = HostState::Connected;
        inner
            .transport
            .publish(&topic, STATE_ONLINE.to_vec(), QoS::AtMostOnce, true)
            .await?;
        self.events.emit(HostEvent::Connected);

        // Separate filters per command type: the high-volume DATA streams
        // may go through a shared subscription group, the control topics
        // stay exclusive.
        let version = inner.config.version.clone();
        let share = inner.config.shared_subscription_group.clone();
        let mut filters: Vec<(String, QoS)> = vec![
            ("STATE/#".to_string(), QoS::AtLeastOnce),
            (format!("{}/+/NBIRTH/+", version), QoS::AtMostOnce),
            (format!("{}/+/NCMD/+", version), QoS::AtMostOnce),
            (format!("{}/+/NDEATH/+", version), QoS::AtMostOnce),
            (format!("{}/+/DBIRTH/+/+", version), QoS::AtMostOnce),
            (format!("{}/+/DCMD/+/+", version), QoS::AtMostOnce),
            (format!("{}/+/DDEATH/+/+", version), QoS::AtMostOnce),
        ];
        for data_filter in [
            format!("{}/+/NDATA/#", version),
            format!("{}/+/DDATA/#", version),
        ] {
            let filter = match &share {
                Some(group) => shared_filter(group, &data_filter),
                None => data_filter,
            };
            filters.push((filter, QoS::AtMostOnce));
        }
        for (filter, qos) in filters {
            inner.transport.subscribe(&filter, qos).await?;
        }

        let pump = tokio::spawn(Self::pump(self.clone(), events));
        inner.pump_task = Some(pump);
        Ok(())
    }

    /// Publishes retained `OFFLINE` and tears down the session.
    pub async fn disconnect(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state == HostState::Disconnected {
            info!("disconnect ignored: not connected");
            return Ok(());
        }

        let topic = state_topic(&inner.config.primary_host_id);
        if let Err(e) = inner
            .transport
            .publish(&topic, STATE_OFFLINE.to_vec(), QoS::AtMostOnce, true)
            .await
        {
            warn!(error = %e, "failed to publish OFFLINE before disconnect");
        }
        inner.transport.disconnect().await?;
        if let Some(pump) = inner.pump_task.take() {
            pump.abort();
        }
        inner.state = HostState::Disconnected;
        self.events.emit(HostEvent::Disconnected);
        Ok(())
    }

    /// Publishes an NCMD to an edge node.
    pub async fn publish_node_command(
        &self,
        group_id: &str,
        edge_node_id: &str,
        metrics: Vec<MetricSnapshot>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.publish_command(group_id, edge_node_id, None, metrics).await
    }

    /// Publishes a DCMD to a device on an edge node.
    pub async fn publish_device_command(
        &self,
        group_id: &str,
        edge_node_id: &str,
        device_id: &str,
        metrics: Vec<MetricSnapshot>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner
            .publish_command(group_id, edge_node_id, Some(device_id), metrics)
            .await
    }

    /// Asks a node to re-announce its full metric set.
    pub async fn request_rebirth(&self, group_id: &str, edge_node_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.request_rebirth(group_id, edge_node_id).await
    }

    async fn pump(host: Host, mut events: tokio::sync::mpsc::Receiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Connected => {}
                TransportEvent::Message { topic, payload } => {
                    host.handle_message(topic, payload).await;
                }
                TransportEvent::Disconnected => {
                    host.events.emit(HostEvent::Disconnected);
                }
                TransportEvent::Error(details) => {
                    host.events.emit(HostEvent::Error(details));
                }
                TransportEvent::Closed => {
                    let mut inner = host.inner.lock().await;
                    inner.pump_task = None;
                    inner.state = HostState::Disconnected;
                    drop(inner);
                    host.events.emit(HostEvent::Closed);
                    break;
                }
            }
        }
    }

    async fn handle_message(&self, topic: String, bytes: Vec<u8>) {
        self.events.emit(HostEvent::Message {
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

        match parsed {
            ParsedTopic::State { host_id } => {
                let online = bytes == STATE_ONLINE;
                self.events.emit(HostEvent::State { host_id, online });
            }
            ParsedTopic::Sparkplug {
                message_type,
                group_id,
                edge_node_id,
                device_id,
                ..
            } => {
                let mut inner = self.inner.lock().await;
                let payload = match inner.codec.decode(&bytes) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(topic = %topic, error = %e, "dropping undecodable payload");
                        return;
                    }
                };

                let outcome = inner.mirror.apply(
                    message_type,
                    &group_id,
                    &edge_node_id,
                    device_id.as_deref(),
                    &payload,
                );
                if let MirrorOutcome::RebirthRequired {
                    group_id,
                    edge_node_id,
                } = outcome
                {
                    if let Err(e) = inner.request_rebirth(&group_id, &edge_node_id).await {
                        warn!(error = %e, "rebirth request failed");
                    }
                }
                drop(inner);

                let message = SparkplugMessage {
                    group_id,
                    edge_node_id,
                    device_id,
                    payload,
                };
                let event = match message_type {
                    MessageType::NBirth => HostEvent::Nbirth(message),
                    MessageType::DBirth => HostEvent::Dbirth(message),
                    MessageType::NData => HostEvent::Ndata(message),
                    MessageType::DData => HostEvent::Ddata(message),
                    MessageType::NDeath => HostEvent::Ndeath(message),
                    MessageType::DDeath => HostEvent::Ddeath(message),
                    MessageType::NCmd => HostEvent::Ncmd(message),
                    MessageType::DCmd => HostEvent::Dcmd(message),
                    MessageType::State => return,
                };
                self.events.emit(event);
            }
        }
    }
}

impl HostInner {
    async fn publish_command(
        &mut self,
        group_id: &str,
        edge_node_id: &str,
        device_id: Option<&str>,
        metrics: Vec<MetricSnapshot>,
    ) -> Result<()> {
        if self.state != HostState::Connected {
            warn!("refusing command publish: host not connected");
            return Ok(());
        }

        let (message_type, topic) = match device_id {
            Some(device_id) => (
                MessageType::DCmd,
                device_topic(
                    &self.config.version,
                    group_id,
                    MessageType::DCmd,
                    edge_node_id,
                    device_id,
                ),
            ),
            None => (
                MessageType::NCmd,
                node_topic(
                    &self.config.version,
                    group_id,
                    MessageType::NCmd,
                    edge_node_id,
                ),
            ),
        };

        let payload = Payload {
            timestamp: Some(now_millis()),
            seq: Some(self.seq.next() as u64),
            uuid: None,
            body: None,
            metrics,
        };
        let bytes = self.codec.encode_plain(&payload);
        self.transport
            .publish(&topic, bytes, QoS::AtMostOnce, false)
            .await
            .map_err(|e| Error::PublishFailed {
                message_type: message_type.as_str(),
                details: e.to_string(),
            })?;
        debug!(topic = %topic, "published {}", message_type);
        Ok(())
    }

    async fn request_rebirth(&mut self, group_id: &str, edge_node_id: &str) -> Result<()> {
        info!(group = %group_id, node = %edge_node_id, "requesting rebirth");
        self.publish_command(group_id, edge_node_id, None, vec![rebirth_metric(true)])
            .await
    }
}
