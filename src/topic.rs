//! Sparkplug topic parsing and construction.
//!
//! Sparkplug B topics follow the format:
//! - `{version}/{group_id}/{message_type}/{edge_node_id}[/{device_id}]`
//! - `STATE/{primary_host_id}`

use crate::error::{Error, Result};

/// The default Sparkplug namespace version.
pub const DEFAULT_VERSION: &str = "spBv1.0";

/// The nine Sparkplug message types.
///
/// The wire tokens encode two facts the rest of the crate keys off: the
/// leading letter addresses a node (`N…`) or a device (`D…`), and the tail
/// names the lifecycle phase (`…BIRTH`, `…DEATH`, `…DATA`, `…CMD`). The
/// classification predicates read those facts off the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// `NBIRTH`: a node announcing itself and its full metric set.
    NBirth,
    /// `NDEATH`: a node going offline (usually the broker-delivered will).
    NDeath,
    /// `NDATA`: node metric updates.
    NData,
    /// `NCMD`: a command addressed to a node.
    NCmd,
    /// `DBIRTH`: a device announcing itself beneath its node.
    DBirth,
    /// `DDEATH`: a device going offline.
    DDeath,
    /// `DDATA`: device metric updates.
    DData,
    /// `DCMD`: a command addressed to a device.
    DCmd,
    /// `STATE`: primary host online/offline state.
    State,
}

impl MessageType {
    /// Every message type, in wire-token order.
    pub const ALL: [MessageType; 9] = [
        MessageType::NBirth,
        MessageType::NDeath,
        MessageType::NData,
        MessageType::NCmd,
        MessageType::DBirth,
        MessageType::DDeath,
        MessageType::DData,
        MessageType::DCmd,
        MessageType::State,
    ];

    /// The token this type contributes to a topic string.
    pub fn as_str(&self) -> &'static str {
        use MessageType::*;
        match self {
            NBirth => "NBIRTH",
            NDeath => "NDEATH",
            NData => "NDATA",
            NCmd => "NCMD",
            DBirth => "DBIRTH",
            DDeath => "DDEATH",
            DData => "DDATA",
            DCmd => "DCMD",
            State => "STATE",
        }
    }

    /// True for the four node-addressed types (`N…`).
    pub fn is_node_message(&self) -> bool {
        self.as_str().starts_with('N')
    }

    /// True for the four device-addressed types (`D…`).
    pub fn is_device_message(&self) -> bool {
        self.as_str().starts_with('D')
    }

    /// True for NBIRTH and DBIRTH.
    pub fn is_birth(&self) -> bool {
        self.as_str().ends_with("BIRTH")
    }

    /// True for NDEATH and DDEATH.
    pub fn is_death(&self) -> bool {
        self.as_str().ends_with("DEATH")
    }

    /// True for NDATA and DDATA.
    pub fn is_data(&self) -> bool {
        self.as_str().ends_with("DATA")
    }

    /// True for NCMD and DCMD.
    pub fn is_command(&self) -> bool {
        self.as_str().ends_with("CMD")
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MessageType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        MessageType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::InvalidTopic(format!("'{}' is not a Sparkplug message type", s)))
    }
}

/// A parsed Sparkplug topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedTopic {
    /// A Sparkplug message topic.
    Sparkplug {
        /// The namespace version, e.g. `spBv1.0`.
        version: String,
        /// The message type.
        message_type: MessageType,
        /// The group ID.
        group_id: String,
        /// The edge node ID.
        edge_node_id: String,
        /// The device ID (only present for device-level messages).
        device_id: Option<String>,
    },
    /// A STATE topic carrying primary host application state.
    State {
        /// The primary host ID.
        host_id: String,
    },
}

impl ParsedTopic {
    /// Parses a Sparkplug topic string.
    ///
    /// # Examples
    ///
    /// ```
    /// use sparkplug_client::ParsedTopic;
    ///
    /// // Node-level message
    /// let topic = ParsedTopic::parse("spBv1.0/Energy/NDATA/Gateway01")?;
    ///
    /// // Device-level message
    /// let topic = ParsedTopic::parse("spBv1.0/Energy/DDATA/Gateway01/Sensor01")?;
    ///
    /// // State message
    /// let topic = ParsedTopic::parse("STATE/ScadaHost01")?;
    /// # Ok::<(), sparkplug_client::Error>(())
    /// ```
    pub fn parse(topic: &str) -> Result<Self> {
        let parts: Vec<&str> = topic.split('/').collect();

        // The reserved STATE prefix short-circuits the Sparkplug grammar.
        if parts.len() == 2 && parts[0] == "STATE" {
            return Ok(ParsedTopic::State {
                host_id: parts[1].to_string(),
            });
        }

        // {version}/{group_id}/{message_type}/{edge_node_id}[/{device_id}]
        if parts.len() < 4 || parts.len() > 5 {
            return Err(Error::InvalidTopic(format!(
                "topic must have 4 or 5 parts, got {}",
                parts.len()
            )));
        }

        let version = parts[0].to_string();
        let group_id = parts[1].to_string();
        let message_type: MessageType = parts[2].parse()?;
        let edge_node_id = parts[3].to_string();
        let device_id = parts.get(4).map(|s| s.to_string());

        // The fifth segment is mandatory for device-addressed types and
        // forbidden for node-addressed ones.
        match (message_type.is_device_message(), &device_id) {
            (true, None) => {
                return Err(Error::InvalidTopic(format!(
                    "device-level {} topic is missing its device segment",
                    message_type
                )));
            }
            (false, Some(_)) if message_type.is_node_message() => {
                return Err(Error::InvalidTopic(format!(
                    "node-level {} topic cannot carry a device segment",
                    message_type
                )));
            }
            _ => {}
        }

        Ok(ParsedTopic::Sparkplug {
            version,
            message_type,
            group_id,
            edge_node_id,
            device_id,
        })
    }

    /// Returns the message type, if this is a Sparkplug message.
    pub fn message_type(&self) -> Option<MessageType> {
        match self {
            ParsedTopic::Sparkplug { message_type, .. } => Some(*message_type),
            ParsedTopic::State { .. } => None,
        }
    }

    /// Returns the namespace version, if this is a Sparkplug message.
    pub fn version(&self) -> Option<&str> {
        match self {
            ParsedTopic::Sparkplug { version, .. } => Some(version),
            ParsedTopic::State { .. } => None,
        }
    }

    /// Returns the group ID, if this is a Sparkplug message.
    pub fn group_id(&self) -> Option<&str> {
        match self {
            ParsedTopic::Sparkplug { group_id, .. } => Some(group_id),
            ParsedTopic::State { .. } => None,
        }
    }

    /// Returns the edge node ID, if this is a Sparkplug message.
    pub fn edge_node_id(&self) -> Option<&str> {
        match self {
            ParsedTopic::Sparkplug { edge_node_id, .. } => Some(edge_node_id),
            ParsedTopic::State { .. } => None,
        }
    }

    /// Returns the device ID, if this is a device-level Sparkplug message.
    pub fn device_id(&self) -> Option<&str> {
        match self {
            ParsedTopic::Sparkplug { device_id, .. } => device_id.as_deref(),
            ParsedTopic::State { .. } => None,
        }
    }

    /// Returns the host ID, if this is a STATE message.
    pub fn host_id(&self) -> Option<&str> {
        match self {
            ParsedTopic::State { host_id } => Some(host_id),
            ParsedTopic::Sparkplug { .. } => None,
        }
    }

    /// Converts the parsed topic back to a topic string.
    pub fn to_topic_string(&self) -> String {
        match self {
            ParsedTopic::Sparkplug {
                version,
                message_type,
                group_id,
                edge_node_id,
                device_id,
            } => match device_id {
                Some(device_id) => format!(
                    "{}/{}/{}/{}/{}",
                    version,
                    group_id,
                    message_type.as_str(),
                    edge_node_id,
                    device_id
                ),
                None => format!(
                    "{}/{}/{}/{}",
                    version,
                    group_id,
                    message_type.as_str(),
                    edge_node_id
                ),
            },
            ParsedTopic::State { host_id } => format!("STATE/{}", host_id),
        }
    }
}

impl std::fmt::Display for ParsedTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_topic_string())
    }
}

/// Builds a node-level topic string.
pub fn node_topic(
    version: &str,
    group_id: &str,
    message_type: MessageType,
    edge_node_id: &str,
) -> String {
    format!(
        "{}/{}/{}/{}",
        version,
        group_id,
        message_type.as_str(),
        edge_node_id
    )
}

/// Builds a device-level topic string.
pub fn device_topic(
    version: &str,
    group_id: &str,
    message_type: MessageType,
    edge_node_id: &str,
    device_id: &str,
) -> String {
    format!(
        "{}/{}/{}/{}/{}",
        version,
        group_id,
        message_type.as_str(),
        edge_node_id,
        device_id
    )
}

/// Builds the STATE topic string for a primary host.
pub fn state_topic(primary_host_id: &str) -> String {
    format!("STATE/{}", primary_host_id)
}
