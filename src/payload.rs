//! Sparkplug payload building, encoding, and compression.
//!
//! The wire format is the Sparkplug B protobuf schema ([`crate::proto`],
//! encoded by `prost`). This module owns everything layered on top of it:
//! the domain payload model, the reserved metric names, and the optional
//! GZIP/DEFLATE compression envelope.

use std::io::{Read, Write};

use flate2::read::{DeflateDecoder, GzDecoder};
use flate2::write::{DeflateEncoder, GzEncoder};
use flate2::Compression;
use prost::Message;

use crate::error::{Error, Result};
use crate::proto;
use crate::types::{now_millis, DataType, MetricValue};

/// Reserved metric name tying an NBIRTH to its NDEATH will.
pub const BDSEQ_METRIC: &str = "bdSeq";

/// Reserved metric name carrying the rebirth command flag.
pub const REBIRTH_METRIC: &str = "Node Control/Rebirth";

/// Prefix routing NCMD metrics to the node command table.
pub const NODE_CONTROL_PREFIX: &str = "Node Control/";

/// Reserved metric name marking a compressed payload envelope.
pub const ALGORITHM_METRIC: &str = "algorithm";

/// Supported payload compression algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionAlgorithm {
    /// GZIP framing.
    #[default]
    Gzip,
    /// Raw DEFLATE.
    Deflate,
}

impl CompressionAlgorithm {
    /// Returns the algorithm token carried in the envelope metric.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionAlgorithm::Gzip => "GZIP",
            CompressionAlgorithm::Deflate => "DEFLATE",
        }
    }

    /// Parses an algorithm token, case-insensitively.
    pub fn parse(token: &str) -> Result<Self> {
        if token.eq_ignore_ascii_case("GZIP") {
            Ok(CompressionAlgorithm::Gzip)
        } else if token.eq_ignore_ascii_case("DEFLATE") {
            Ok(CompressionAlgorithm::Deflate)
        } else {
            Err(Error::InvalidPayload(format!(
                "unknown compression algorithm: {}",
                token
            )))
        }
    }
}

/// Outbound payload encoding options.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadOptions {
    /// Whether DATA/BIRTH payloads are compressed before publishing.
    pub compress: bool,
    /// Algorithm used when compression is enabled.
    pub algorithm: CompressionAlgorithm,
}

/// A single metric as carried in a payload.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSnapshot {
    /// Metric name (absent on alias-only updates).
    pub name: Option<String>,
    /// Metric alias.
    pub alias: Option<u64>,
    /// Metric timestamp in milliseconds since Unix epoch.
    pub timestamp: Option<u64>,
    /// Data type.
    pub datatype: DataType,
    /// Metric value (or Null).
    pub value: MetricValue,
    /// Pass-through properties.
    pub properties: Option<proto::PropertySet>,
}

impl MetricSnapshot {
    /// Creates a named metric snapshot.
    pub fn new(name: impl Into<String>, datatype: DataType, value: MetricValue) -> Self {
        Self {
            name: Some(name.into()),
            alias: None,
            timestamp: None,
            datatype,
            value,
            properties: None,
        }
    }

    /// Sets the metric timestamp.
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    fn to_wire(&self) -> proto::Metric {
        let value = match &self.value {
            MetricValue::Int8(v) => Some(proto::metric::Value::IntValue(*v as u8 as u32)),
            MetricValue::Int16(v) => Some(proto::metric::Value::IntValue(*v as u16 as u32)),
            MetricValue::Int32(v) => Some(proto::metric::Value::IntValue(*v as u32)),
            MetricValue::Int64(v) => Some(proto::metric::Value::LongValue(*v as u64)),
            MetricValue::UInt8(v) => Some(proto::metric::Value::IntValue(*v as u32)),
            MetricValue::UInt16(v) => Some(proto::metric::Value::IntValue(*v as u32)),
            MetricValue::UInt32(v) => Some(proto::metric::Value::IntValue(*v)),
            MetricValue::UInt64(v) => Some(proto::metric::Value::LongValue(*v)),
            MetricValue::Float(v) => Some(proto::metric::Value::FloatValue(*v)),
            MetricValue::Double(v) => Some(proto::metric::Value::DoubleValue(*v)),
            MetricValue::Boolean(v) => Some(proto::metric::Value::BooleanValue(*v)),
            MetricValue::String(v) => Some(proto::metric::Value::StringValue(v.clone())),
            MetricValue::Null => None,
        };

        proto::Metric {
            name: self.name.clone(),
            alias: self.alias,
            timestamp: self.timestamp,
            datatype: Some(self.datatype.code()),
            is_historical: None,
            is_transient: None,
            is_null: self.value.is_null().then_some(true),
            metadata: None,
            properties: self.properties.clone(),
            value,
        }
    }

    fn from_wire(metric: proto::Metric) -> Self {
        let datatype = metric
            .datatype
            .map(DataType::from_code)
            .unwrap_or(DataType::Unknown);

        // Sign-extension is directed by the declared datatype so 64-bit
        // integers survive the round trip without passing through f64.
        let value = match (&metric.value, datatype) {
            (None, _) => MetricValue::Null,
            (Some(proto::metric::Value::IntValue(v)), DataType::Int8) => {
                MetricValue::Int8(*v as u8 as i8)
            }
            (Some(proto::metric::Value::IntValue(v)), DataType::Int16) => {
                MetricValue::Int16(*v as u16 as i16)
            }
            (Some(proto::metric::Value::IntValue(v)), DataType::Int32) => {
                MetricValue::Int32(*v as i32)
            }
            (Some(proto::metric::Value::IntValue(v)), DataType::UInt8) => {
                MetricValue::UInt8(*v as u8)
            }
            (Some(proto::metric::Value::IntValue(v)), DataType::UInt16) => {
                MetricValue::UInt16(*v as u16)
            }
            (Some(proto::metric::Value::IntValue(v)), _) => MetricValue::UInt32(*v),
            (Some(proto::metric::Value::LongValue(v)), DataType::Int64) => {
                MetricValue::Int64(*v as i64)
            }
            (Some(proto::metric::Value::LongValue(v)), _) => MetricValue::UInt64(*v),
            (Some(proto::metric::Value::FloatValue(v)), _) => MetricValue::Float(*v),
            (Some(proto::metric::Value::DoubleValue(v)), _) => MetricValue::Double(*v),
            (Some(proto::metric::Value::BooleanValue(v)), _) => MetricValue::Boolean(*v),
            (Some(proto::metric::Value::StringValue(v)), _) => MetricValue::String(v.clone()),
            (Some(proto::metric::Value::BytesValue(_)), _) => MetricValue::Null,
        };

        let value = if metric.is_null == Some(true) {
            MetricValue::Null
        } else {
            value
        };

        Self {
            name: metric.name,
            alias: metric.alias,
            timestamp: metric.timestamp,
            datatype,
            value,
            properties: metric.properties,
        }
    }
}

/// A decoded Sparkplug payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Payload {
    /// Payload timestamp in milliseconds since Unix epoch.
    pub timestamp: Option<u64>,
    /// Sequence number, 0..255; absent on NDEATH.
    pub seq: Option<u64>,
    /// Payload UUID.
    pub uuid: Option<String>,
    /// Opaque body bytes.
    pub body: Option<Vec<u8>>,
    /// Metric entries.
    pub metrics: Vec<MetricSnapshot>,
}

impl Payload {
    /// Creates a payload stamped with the current time.
    pub fn now(metrics: Vec<MetricSnapshot>) -> Self {
        Self {
            timestamp: Some(now_millis()),
            seq: None,
            uuid: None,
            body: None,
            metrics,
        }
    }

    /// Finds a metric snapshot by name.
    pub fn metric(&self, name: &str) -> Option<&MetricSnapshot> {
        self.metrics
            .iter()
            .find(|m| m.name.as_deref() == Some(name))
    }

    fn to_wire(&self) -> proto::Payload {
        proto::Payload {
            timestamp: self.timestamp,
            metrics: self.metrics.iter().map(MetricSnapshot::to_wire).collect(),
            seq: self.seq,
            uuid: self.uuid.clone(),
            body: self.body.clone(),
        }
    }

    fn from_wire(payload: proto::Payload) -> Self {
        Self {
            timestamp: payload.timestamp,
            seq: payload.seq,
            uuid: payload.uuid,
            body: payload.body,
            metrics: payload
                .metrics
                .into_iter()
                .map(MetricSnapshot::from_wire)
                .collect(),
        }
    }
}

/// Builds the `bdSeq` metric carried on NBIRTH and the NDEATH will.
pub fn bd_seq_metric(bd_seq: u8) -> MetricSnapshot {
    MetricSnapshot::new(BDSEQ_METRIC, DataType::UInt64, MetricValue::UInt64(bd_seq as u64))
}

/// Builds the `Node Control/Rebirth` metric.
pub fn rebirth_metric(value: bool) -> MetricSnapshot {
    MetricSnapshot::new(REBIRTH_METRIC, DataType::Boolean, MetricValue::Boolean(value))
}

/// Encoder/decoder for Sparkplug payload bytes.
///
/// Wraps the protobuf codec and applies the compression envelope: when
/// enabled, the encoded inner payload becomes the `body` of an outer
/// payload whose single `algorithm` metric names the algorithm used.
#[derive(Debug, Clone, Default)]
pub struct PayloadCodec {
    options: PayloadOptions,
}

impl PayloadCodec {
    /// Creates a codec with the given options.
    pub fn new(options: PayloadOptions) -> Self {
        Self { options }
    }

    /// Returns the configured options.
    pub fn options(&self) -> PayloadOptions {
        self.options
    }

    /// Encodes a payload without the compression envelope.
    ///
    /// NDEATH wills and command payloads are never compressed.
    pub fn encode_plain(&self, payload: &Payload) -> Vec<u8> {
        payload.to_wire().encode_to_vec()
    }

    /// Encodes a payload to wire bytes, compressing if enabled.
    pub fn encode(&self, payload: &Payload) -> Result<Vec<u8>> {
        let inner = payload.to_wire().encode_to_vec();
        if !self.options.compress {
            return Ok(inner);
        }

        let algorithm = self.options.algorithm;
        let envelope = proto::Payload {
            timestamp: payload.timestamp,
            metrics: vec![MetricSnapshot::new(
                ALGORITHM_METRIC,
                DataType::String,
                MetricValue::String(algorithm.as_str().to_string()),
            )
            .to_wire()],
            seq: None,
            uuid: None,
            body: Some(compress(&inner, algorithm)?),
        };
        Ok(envelope.encode_to_vec())
    }

    /// Decodes wire bytes into a payload, transparently unwrapping the
    /// compression envelope when an `algorithm` metric is present.
    pub fn decode(&self, bytes: &[u8]) -> Result<Payload> {
        let wire = proto::Payload::decode(bytes)?;

        let algorithm = wire.metrics.iter().find_map(|m| {
            if m.name.as_deref() == Some(ALGORITHM_METRIC) {
                match &m.value {
                    Some(proto::metric::Value::StringValue(s)) => Some(s.clone()),
                    _ => None,
                }
            } else {
                None
            }
        });

        match (algorithm, &wire.body) {
            (Some(token), Some(body)) => {
                let algorithm = CompressionAlgorithm::parse(&token)?;
                let inner = decompress(body, algorithm)?;
                Ok(Payload::from_wire(proto::Payload::decode(&inner[..])?))
            }
            (Some(token), None) => Err(Error::InvalidPayload(format!(
                "compressed payload ({}) carries no body",
                token
            ))),
            (None, _) => Ok(Payload::from_wire(wire)),
        }
    }
}

fn compress(bytes: &[u8], algorithm: CompressionAlgorithm) -> Result<Vec<u8>> {
    match algorithm {
        CompressionAlgorithm::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(bytes)?;
            Ok(encoder.finish()?)
        }
        CompressionAlgorithm::Deflate => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(bytes)?;
            Ok(encoder.finish()?)
        }
    }
}

fn decompress(bytes: &[u8], algorithm: CompressionAlgorithm) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let result = match algorithm {
        CompressionAlgorithm::Gzip => GzDecoder::new(bytes).read_to_end(&mut out),
        CompressionAlgorithm::Deflate => DeflateDecoder::new(bytes).read_to_end(&mut out),
    };
    result.map_err(|e| Error::InvalidPayload(format!("decompression failed: {}", e)))?;
    Ok(out)
}
