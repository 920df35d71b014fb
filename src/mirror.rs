//! Host-side topology mirror.
//!
//! Builds the live groups → nodes → devices → metrics tree from observed
//! births, applies DATA updates by metric name, and reports when a message
//! arrives for a node or device the mirror has never seen born, so the
//! host can request a rebirth.

use std::collections::BTreeMap;

use tracing::debug;

use crate::payload::{MetricSnapshot, Payload};
use crate::topic::MessageType;

/// Mirror of a device observed through a DBIRTH.
#[derive(Debug, Clone, Default)]
pub struct DeviceView {
    /// Device identifier.
    pub id: String,
    /// Metrics keyed by name.
    pub metrics: BTreeMap<String, MetricSnapshot>,
}

/// Mirror of an edge node observed through an NBIRTH.
#[derive(Debug, Clone, Default)]
pub struct NodeView {
    /// Edge node identifier.
    pub id: String,
    /// Metrics keyed by name.
    pub metrics: BTreeMap<String, MetricSnapshot>,
    /// Devices keyed by ID.
    pub devices: BTreeMap<String, DeviceView>,
}

/// Mirror of a Sparkplug group.
#[derive(Debug, Clone, Default)]
pub struct GroupView {
    /// Group identifier.
    pub id: String,
    /// Nodes keyed by ID.
    pub nodes: BTreeMap<String, NodeView>,
}

/// Outcome of applying one observed message to the mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorOutcome {
    /// The message updated the mirror.
    Applied,
    /// The message does not touch the mirror (commands, STATE).
    Ignored,
    /// The mirror holds no view for the target; the node must be asked to
    /// re-announce itself.
    RebirthRequired {
        /// The group the gap was observed in.
        group_id: String,
        /// The node that must rebirth.
        edge_node_id: String,
    },
}

/// The assembled view of every observed group, node, and device.
#[derive(Debug, Clone, Default)]
pub struct TopologyMirror {
    groups: BTreeMap<String, GroupView>,
}

impl TopologyMirror {
    /// Creates an empty mirror.
    pub fn new() -> Self {
        Self::default()
    }

    /// All observed groups, keyed by ID.
    pub fn groups(&self) -> &BTreeMap<String, GroupView> {
        &self.groups
    }

    /// Looks up a node view.
    pub fn node(&self, group_id: &str, edge_node_id: &str) -> Option<&NodeView> {
        self.groups.get(group_id)?.nodes.get(edge_node_id)
    }

    /// Looks up a device view.
    pub fn device(
        &self,
        group_id: &str,
        edge_node_id: &str,
        device_id: &str,
    ) -> Option<&DeviceView> {
        self.node(group_id, edge_node_id)?.devices.get(device_id)
    }

    /// Applies one observed message.
    ///
    /// Births replace the target wholesale; DATA merges by metric name
    /// (unknown names are accepted); deaths remove the target. A DBIRTH or
    /// DATA for an unknown node or device yields
    /// [`MirrorOutcome::RebirthRequired`] and is not applied.
    pub fn apply(
        &mut self,
        message_type: MessageType,
        group_id: &str,
        edge_node_id: &str,
        device_id: Option<&str>,
        payload: &Payload,
    ) -> MirrorOutcome {
        match message_type {
            MessageType::NBirth => {
                let group = self
                    .groups
                    .entry(group_id.to_string())
                    .or_insert_with(|| GroupView {
                        id: group_id.to_string(),
                        nodes: BTreeMap::new(),
                    });
                let mut node = NodeView {
                    id: edge_node_id.to_string(),
                    metrics: BTreeMap::new(),
                    devices: BTreeMap::new(),
                };
                for metric in &payload.metrics {
                    merge_metric(&mut node.metrics, metric);
                }
                group.nodes.insert(edge_node_id.to_string(), node);
                MirrorOutcome::Applied
            }
            MessageType::DBirth => {
                let Some(device_id) = device_id else {
                    return MirrorOutcome::Ignored;
                };
                let Some(node) = self.node_mut(group_id, edge_node_id) else {
                    return rebirth(group_id, edge_node_id);
                };
                let mut device = DeviceView {
                    id: device_id.to_string(),
                    metrics: BTreeMap::new(),
                };
                for metric in &payload.metrics {
                    merge_metric(&mut device.metrics, metric);
                }
                node.devices.insert(device_id.to_string(), device);
                MirrorOutcome::Applied
            }
            MessageType::NData => {
                let Some(node) = self.node_mut(group_id, edge_node_id) else {
                    return rebirth(group_id, edge_node_id);
                };
                for metric in &payload.metrics {
                    merge_metric(&mut node.metrics, metric);
                }
                MirrorOutcome::Applied
            }
            MessageType::DData => {
                let Some(device_id) = device_id else {
                    return MirrorOutcome::Ignored;
                };
                let Some(device) = self
                    .node_mut(group_id, edge_node_id)
                    .and_then(|node| node.devices.get_mut(device_id))
                else {
                    return rebirth(group_id, edge_node_id);
                };
                for metric in &payload.metrics {
                    merge_metric(&mut device.metrics, metric);
                }
                MirrorOutcome::Applied
            }
            MessageType::NDeath => {
                if let Some(group) = self.groups.get_mut(group_id) {
                    group.nodes.remove(edge_node_id);
                }
                MirrorOutcome::Applied
            }
            MessageType::DDeath => {
                if let Some(device_id) = device_id {
                    if let Some(node) = self.node_mut(group_id, edge_node_id) {
                        node.devices.remove(device_id);
                    }
                }
                MirrorOutcome::Applied
            }
            MessageType::NCmd | MessageType::DCmd | MessageType::State => MirrorOutcome::Ignored,
        }
    }

    /// Converts the nested mapping view into export arrays; map keys become
    /// the `id` and `name` fields.
    pub fn flatten(&self) -> Vec<GroupExport> {
        self.groups
            .values()
            .map(|group| GroupExport {
                id: group.id.clone(),
                name: group.id.clone(),
                nodes: group
                    .nodes
                    .values()
                    .map(|node| NodeExport {
                        id: node.id.clone(),
                        name: node.id.clone(),
                        metrics: node.metrics.values().cloned().collect(),
                        devices: node
                            .devices
                            .values()
                            .map(|device| DeviceExport {
                                id: device.id.clone(),
                                name: device.id.clone(),
                                metrics: device.metrics.values().cloned().collect(),
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect()
    }

    fn node_mut(&mut self, group_id: &str, edge_node_id: &str) -> Option<&mut NodeView> {
        self.groups.get_mut(group_id)?.nodes.get_mut(edge_node_id)
    }
}

fn rebirth(group_id: &str, edge_node_id: &str) -> MirrorOutcome {
    debug!(group = %group_id, node = %edge_node_id, "message for unknown node, rebirth required");
    MirrorOutcome::RebirthRequired {
        group_id: group_id.to_string(),
        edge_node_id: edge_node_id.to_string(),
    }
}

/// Merges one incoming metric into a mapping by name.
///
/// Properties attached by an earlier birth survive a plain-scalar update
/// that carries none.
fn merge_metric(metrics: &mut BTreeMap<String, MetricSnapshot>, incoming: &MetricSnapshot) {
    let Some(name) = incoming.name.clone() else {
        debug!("skipping unnamed metric in mirror update");
        return;
    };
    match metrics.get_mut(&name) {
        Some(existing) => {
            let preserved = existing.properties.take();
            *existing = incoming.clone();
            if existing.properties.is_none() {
                existing.properties = preserved;
            }
        }
        None => {
            metrics.insert(name, incoming.clone());
        }
    }
}

/// Export form of a group.
#[derive(Debug, Clone)]
pub struct GroupExport {
    /// Group identifier.
    pub id: String,
    /// Group name (same as the identifier).
    pub name: String,
    /// The group's nodes.
    pub nodes: Vec<NodeExport>,
}

/// Export form of an edge node.
#[derive(Debug, Clone)]
pub struct NodeExport {
    /// Node identifier.
    pub id: String,
    /// Node name (same as the identifier).
    pub name: String,
    /// The node's metrics.
    pub metrics: Vec<MetricSnapshot>,
    /// The node's devices.
    pub devices: Vec<DeviceExport>,
}

/// Export form of a device.
#[derive(Debug, Clone)]
pub struct DeviceExport {
    /// Device identifier.
    pub id: String,
    /// Device name (same as the identifier).
    pub name: String,
    /// The device's metrics.
    pub metrics: Vec<MetricSnapshot>,
}
