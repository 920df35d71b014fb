//! Sparkplug B client library for edge nodes and host applications.
//!
//! Sparkplug B layers a disciplined lifecycle (birth / death / data /
//! command) over MQTT so SCADA hosts can reliably consume live process
//! data from field gateways and their attached devices. This crate
//! implements both sides of that contract:
//!
//! - [`EdgeNode`]: owns metrics and devices, streams them under
//!   bandwidth-conscious rules (scan rates, report-by-exception with
//!   numeric deadbands), and answers rebirth commands.
//! - [`Host`]: declares itself on the retained `STATE/<id>` topic,
//!   subscribes to the namespace, assembles a live mirror of every
//!   observed node and device, and requests rebirths when its view
//!   desynchronises.
//!
//! The MQTT transport (`rumqttc`), the protobuf codec (`prost`), and
//! compression (`flate2`) are external collaborators; this crate owns the
//! protocol behaviour on top of them.
//!
//! # Example: edge node
//!
//! ```no_run
//! use sparkplug_client::{DataType, DeviceSpec, EdgeNode, Metric, MetricValue, NodeConfig};
//!
//! # async fn run() -> Result<(), sparkplug_client::Error> {
//! let node = EdgeNode::new(
//!     NodeConfig::new("mqtt://localhost:1883", "gw01", "Energy", "Gateway01"),
//!     vec![
//!         Metric::new("Temperature", DataType::Double, MetricValue::Double(20.5))
//!             .with_scan_rate(1_000)
//!             .with_deadband(0.5, Some(60_000)),
//!     ],
//!     vec![DeviceSpec::new("Sensor01").with_metric(Metric::new(
//!         "Active",
//!         DataType::Boolean,
//!         MetricValue::Boolean(true),
//!     ).with_scan_rate(1_000))],
//! )?;
//!
//! // Connect births the node and its devices and starts the scan timers.
//! node.connect().await?;
//! node.set_metric("Temperature", MetricValue::Double(21.2)).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Example: host application
//!
//! ```no_run
//! use sparkplug_client::{Host, HostConfig, HostEvent};
//!
//! # async fn run() -> Result<(), sparkplug_client::Error> {
//! let host = Host::new(HostConfig::new(
//!     "mqtt://localhost:1883",
//!     "scada01",
//!     "ScadaHost01",
//! ))?;
//! let mut events = host.events().subscribe();
//! host.connect().await?;
//!
//! while let Ok(event) = events.recv().await {
//!     if let HostEvent::Nbirth(message) = event {
//!         println!("node {} born", message.edge_node_id);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod device;
pub mod error;
pub mod events;
pub mod host;
pub mod mirror;
pub mod mqtt;
pub mod node;
pub mod payload;
pub mod proto;
pub mod scheduler;
pub mod sequence;
pub mod topic;
pub mod types;

pub use device::{Device, DeviceSpec, DeviceState};
pub use error::{Error, Result};
pub use events::{EventBus, HostEvent, NodeEvent, SparkplugMessage};
pub use host::{Host, HostConfig, HostState};
pub use mirror::{
    DeviceExport, DeviceView, GroupExport, GroupView, MirrorOutcome, NodeExport, NodeView,
    TopologyMirror,
};
pub use mqtt::{ConnectOptions, MqttTransport, QoS, Transport, TransportEvent, Will};
pub use node::{EdgeNode, NodeConfig, NodeState};
pub use payload::{
    CompressionAlgorithm, MetricSnapshot, Payload, PayloadCodec, PayloadOptions,
};
pub use topic::{MessageType, ParsedTopic};
pub use types::{DataType, Deadband, LastPublished, Metric, MetricValue, ValueSource};
