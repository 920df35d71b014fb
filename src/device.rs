//! Device sub-machine: per-device born/dead lifecycle.

use std::collections::BTreeMap;

use tracing::warn;

use crate::types::Metric;

/// Device lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceState {
    /// The device has not been born, or has died.
    #[default]
    Dead,
    /// The device announced itself with a DBIRTH.
    Born,
}

/// Initial configuration for a device attached to an edge node.
#[derive(Debug, Clone)]
pub struct DeviceSpec {
    /// Device identifier, unique within its node.
    pub id: String,
    /// The device's metrics.
    pub metrics: Vec<Metric>,
}

impl DeviceSpec {
    /// Creates a device spec with no metrics.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            metrics: Vec::new(),
        }
    }

    /// Adds a metric.
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metrics.push(metric);
        self
    }
}

/// A device owned by exactly one edge node.
///
/// Transitions are driven by the owning node, which holds the connection
/// and enforces the node-level guards; the device tracks only its own
/// born/dead state.
#[derive(Debug)]
pub struct Device {
    pub(crate) id: String,
    pub(crate) metrics: BTreeMap<String, Metric>,
    pub(crate) state: DeviceState,
}

impl Device {
    pub(crate) fn from_spec(spec: DeviceSpec) -> Self {
        Self {
            id: spec.id,
            metrics: spec
                .metrics
                .into_iter()
                .map(|m| (m.name.clone(), m))
                .collect(),
            state: DeviceState::Dead,
        }
    }

    /// The device identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The current lifecycle state.
    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Applies the dead → born transition. Returns false (and warns)
    /// when the device is already born.
    pub(crate) fn try_birth(&mut self) -> bool {
        if self.state == DeviceState::Born {
            warn!(device = %self.id, "ignoring birth for already-born device");
            return false;
        }
        self.state = DeviceState::Born;
        true
    }

    /// Applies the born → dead transition. Returns false (and warns)
    /// when the device is already dead.
    pub(crate) fn try_death(&mut self) -> bool {
        if self.state == DeviceState::Dead {
            warn!(device = %self.id, "ignoring death for already-dead device");
            return false;
        }
        self.state = DeviceState::Dead;
        true
    }
}
