//! Typed event surface for edge nodes and hosts.
//!
//! Application code observes protocol activity by subscribing to the
//! [`EventBus`] of a node or host. The bus is observability, not a delivery
//! guarantee: lagging subscribers lose the oldest events.

use tokio::sync::broadcast;

use crate::node::NodeState;
use crate::payload::Payload;
use crate::topic::MessageType;

/// Events emitted by an edge node.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    /// The broker acknowledged the session.
    Connected,
    /// The node returned to the disconnected state.
    Disconnected,
    /// The transport session ended.
    Closed,
    /// A transport or protocol error occurred.
    Error(String),
    /// A lifecycle transition completed.
    StateChanged(NodeState),
    /// The node published a Sparkplug message.
    Published {
        /// The message type that went out.
        message_type: MessageType,
        /// The full topic string.
        topic: String,
        /// The payload as sent (pre-encoding).
        payload: Payload,
    },
    /// An NCMD arrived for this node.
    Ncmd(Payload),
    /// A DCMD arrived for one of this node's devices.
    Dcmd {
        /// The targeted device.
        device_id: String,
        /// The decoded command payload.
        payload: Payload,
    },
    /// A raw inbound MQTT message (also emitted when decoding fails).
    Message {
        /// The topic the message arrived on.
        topic: String,
        /// Raw payload bytes.
        payload: Vec<u8>,
    },
}

/// A decoded Sparkplug message observed by a host.
#[derive(Debug, Clone)]
pub struct SparkplugMessage {
    /// The group the message belongs to.
    pub group_id: String,
    /// The edge node that produced (or is targeted by) the message.
    pub edge_node_id: String,
    /// The device, for device-level messages.
    pub device_id: Option<String>,
    /// The decoded payload.
    pub payload: Payload,
}

/// Events emitted by a host application.
#[derive(Debug, Clone)]
pub enum HostEvent {
    /// The broker acknowledged the session.
    Connected,
    /// The host returned to the disconnected state.
    Disconnected,
    /// The transport session ended.
    Closed,
    /// A transport or protocol error occurred.
    Error(String),
    /// A STATE message was observed.
    State {
        /// The primary host the state belongs to.
        host_id: String,
        /// True for `ONLINE`, false for `OFFLINE`.
        online: bool,
    },
    /// An NBIRTH was observed.
    Nbirth(SparkplugMessage),
    /// A DBIRTH was observed.
    Dbirth(SparkplugMessage),
    /// An NDATA was observed.
    Ndata(SparkplugMessage),
    /// A DDATA was observed.
    Ddata(SparkplugMessage),
    /// An NDEATH was observed.
    Ndeath(SparkplugMessage),
    /// A DDEATH was observed.
    Ddeath(SparkplugMessage),
    /// An NCMD was observed on the namespace.
    Ncmd(SparkplugMessage),
    /// A DCMD was observed on the namespace.
    Dcmd(SparkplugMessage),
    /// A raw inbound MQTT message (also emitted when decoding fails).
    Message {
        /// The topic the message arrived on.
        topic: String,
        /// Raw payload bytes.
        payload: Vec<u8>,
    },
}

/// A broadcast bus carrying typed events to any number of subscribers.
#[derive(Debug, Clone)]
pub struct EventBus<E> {
    tx: broadcast::Sender<E>,
}

impl<E: Clone> EventBus<E> {
    /// Creates a bus retaining up to `capacity` undelivered events per
    /// subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Registers a new subscriber.
    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.tx.subscribe()
    }

    /// Emits an event to all current subscribers. Events emitted while no
    /// subscriber exists are dropped.
    pub(crate) fn emit(&self, event: E) {
        let _ = self.tx.send(event);
    }
}

impl<E: Clone> Default for EventBus<E> {
    fn default() -> Self {
        Self::new(256)
    }
}
