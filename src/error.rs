//! Error types for the Sparkplug client library.

use thiserror::Error;

/// Result type alias for Sparkplug operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur when using the Sparkplug client.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration detected at construction time.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Invalid topic string.
    #[error("Invalid topic: {0}")]
    InvalidTopic(String),

    /// The payload could not be decoded or decompressed.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Failed to connect to the MQTT broker.
    #[error("Failed to connect to broker: {0}")]
    ConnectionFailed(String),

    /// The broker did not acknowledge the connection within the timeout.
    #[error("Connection timed out after {timeout_ms} ms")]
    ConnectTimeout {
        /// The configured connect timeout in milliseconds
        timeout_ms: u64,
    },

    /// A transport-level operation failed.
    #[error("Transport error during {operation}: {details}")]
    Transport {
        /// The operation that failed
        operation: &'static str,
        /// Additional details about the failure
        details: String,
    },

    /// Failed to publish a message.
    #[error("Failed to publish {message_type}: {details}")]
    PublishFailed {
        /// The type of message that failed to publish
        message_type: &'static str,
        /// Additional details about the failure
        details: String,
    },

    /// A metric name was not found on the targeted owner.
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    /// A device ID was not found on the node.
    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    /// Protobuf decoding failed.
    #[error("Failed to decode payload: {0}")]
    Decode(#[from] prost::DecodeError),

    /// Compression or decompression failed.
    #[error("Compression error: {0}")]
    Compression(#[from] std::io::Error),
}
