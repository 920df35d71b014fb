//! Common types for the Sparkplug client.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::proto;

/// Returns the current time in milliseconds since the Unix epoch.
///
/// Sparkplug B timestamps are millisecond-valued throughout.
pub(crate) fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

/// Sparkplug data types.
///
/// The numeric codes are the ones carried in the `datatype` field of the
/// wire schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DataType {
    /// Unknown or unsupported type
    Unknown = 0,
    /// Signed 8-bit integer
    Int8 = 1,
    /// Signed 16-bit integer
    Int16 = 2,
    /// Signed 32-bit integer
    Int32 = 3,
    /// Signed 64-bit integer
    Int64 = 4,
    /// Unsigned 8-bit integer
    UInt8 = 5,
    /// Unsigned 16-bit integer
    UInt16 = 6,
    /// Unsigned 32-bit integer
    UInt32 = 7,
    /// Unsigned 64-bit integer
    UInt64 = 8,
    /// 32-bit floating point
    Float = 9,
    /// 64-bit floating point
    Double = 10,
    /// Boolean value
    Boolean = 11,
    /// String value
    String = 12,
    /// DateTime value, milliseconds since Unix epoch
    DateTime = 13,
    /// Text value
    Text = 14,
}

impl DataType {
    /// Returns the wire code for this data type.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Converts a wire code into a data type.
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => DataType::Int8,
            2 => DataType::Int16,
            3 => DataType::Int32,
            4 => DataType::Int64,
            5 => DataType::UInt8,
            6 => DataType::UInt16,
            7 => DataType::UInt32,
            8 => DataType::UInt64,
            9 => DataType::Float,
            10 => DataType::Double,
            11 => DataType::Boolean,
            12 => DataType::String,
            13 => DataType::DateTime,
            14 => DataType::Text,
            _ => DataType::Unknown,
        }
    }

    /// Returns true for the integer and floating point types.
    ///
    /// Deadband evaluation applies only to numeric metrics.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
                | DataType::Float
                | DataType::Double
        )
    }
}

/// Metric value type.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    /// Signed 8-bit integer value
    Int8(i8),
    /// Signed 16-bit integer value
    Int16(i16),
    /// Signed 32-bit integer value
    Int32(i32),
    /// Signed 64-bit integer value
    Int64(i64),
    /// Unsigned 8-bit integer value
    UInt8(u8),
    /// Unsigned 16-bit integer value
    UInt16(u16),
    /// Unsigned 32-bit integer value
    UInt32(u32),
    /// Unsigned 64-bit integer value
    UInt64(u64),
    /// 32-bit floating point value
    Float(f32),
    /// 64-bit floating point value
    Double(f64),
    /// Boolean value
    Boolean(bool),
    /// String value
    String(String),
    /// Null value
    Null,
}

impl MetricValue {
    /// Returns the value as an `f64` for deadband arithmetic.
    ///
    /// 64-bit integers are widened lossily here; the wire encoding keeps
    /// them native, only the deadband comparison goes through `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Int8(v) => Some(*v as f64),
            MetricValue::Int16(v) => Some(*v as f64),
            MetricValue::Int32(v) => Some(*v as f64),
            MetricValue::Int64(v) => Some(*v as f64),
            MetricValue::UInt8(v) => Some(*v as f64),
            MetricValue::UInt16(v) => Some(*v as f64),
            MetricValue::UInt32(v) => Some(*v as f64),
            MetricValue::UInt64(v) => Some(*v as f64),
            MetricValue::Float(v) => Some(*v as f64),
            MetricValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns true if this is the null value.
    pub fn is_null(&self) -> bool {
        matches!(self, MetricValue::Null)
    }

    /// Returns the data type naturally corresponding to this value.
    pub fn datatype(&self) -> DataType {
        match self {
            MetricValue::Int8(_) => DataType::Int8,
            MetricValue::Int16(_) => DataType::Int16,
            MetricValue::Int32(_) => DataType::Int32,
            MetricValue::Int64(_) => DataType::Int64,
            MetricValue::UInt8(_) => DataType::UInt8,
            MetricValue::UInt16(_) => DataType::UInt16,
            MetricValue::UInt32(_) => DataType::UInt32,
            MetricValue::UInt64(_) => DataType::UInt64,
            MetricValue::Float(_) => DataType::Float,
            MetricValue::Double(_) => DataType::Double,
            MetricValue::Boolean(_) => DataType::Boolean,
            MetricValue::String(_) => DataType::String,
            MetricValue::Null => DataType::Unknown,
        }
    }
}

/// A synchronous metric value producer.
pub type Producer = Arc<dyn Fn() -> MetricValue + Send + Sync>;

/// An asynchronous metric value producer.
pub type AsyncProducer =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = MetricValue> + Send>> + Send + Sync>;

/// The source of a metric's value: a stored scalar or a producer that is
/// invoked immediately before each publish consideration.
#[derive(Clone)]
pub enum ValueSource {
    /// A plain scalar value.
    Value(MetricValue),
    /// A synchronous producer returning the current value.
    Producer(Producer),
    /// An asynchronous producer resolving to the current value.
    AsyncProducer(AsyncProducer),
}

impl ValueSource {
    /// Resolves the current scalar value.
    pub async fn evaluate(&self) -> MetricValue {
        match self {
            ValueSource::Value(v) => v.clone(),
            ValueSource::Producer(f) => f(),
            ValueSource::AsyncProducer(f) => f().await,
        }
    }
}

impl fmt::Debug for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSource::Value(v) => f.debug_tuple("Value").field(v).finish(),
            ValueSource::Producer(_) => f.write_str("Producer(..)"),
            ValueSource::AsyncProducer(_) => f.write_str("AsyncProducer(..)"),
        }
    }
}

impl From<MetricValue> for ValueSource {
    fn from(value: MetricValue) -> Self {
        ValueSource::Value(value)
    }
}

/// Report-by-exception deadband configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deadband {
    /// The absolute change required before a numeric metric republishes.
    pub value: f64,
    /// Maximum time in milliseconds a value may go unpublished, regardless
    /// of change.
    pub max_time: Option<u64>,
}

/// Record of the last value actually sent on the wire for a metric.
#[derive(Debug, Clone, PartialEq)]
pub struct LastPublished {
    /// Publish time in milliseconds since Unix epoch.
    pub timestamp: u64,
    /// The value that went out.
    pub value: MetricValue,
}

/// A named, typed metric owned by an edge node or device.
#[derive(Debug, Clone)]
pub struct Metric {
    /// Metric name, unique within its owner.
    pub name: String,
    /// Declared data type.
    pub datatype: DataType,
    /// Scalar value or producer.
    pub value: ValueSource,
    /// Milliseconds between publish eligibility evaluations.
    pub scan_rate: Option<u64>,
    /// Report-by-exception deadband.
    pub deadband: Option<Deadband>,
    /// Pass-through protocol properties.
    pub properties: Option<proto::PropertySet>,
    /// Pass-through timestamp override in milliseconds since Unix epoch.
    pub timestamp: Option<u64>,
    /// What was last sent on the wire for this metric.
    pub last_published: Option<LastPublished>,
}

impl Metric {
    /// Creates a metric holding a plain scalar value.
    pub fn new(name: impl Into<String>, datatype: DataType, value: MetricValue) -> Self {
        Self {
            name: name.into(),
            datatype,
            value: ValueSource::Value(value),
            scan_rate: None,
            deadband: None,
            properties: None,
            timestamp: None,
            last_published: None,
        }
    }

    /// Creates a metric whose value is produced synchronously on each
    /// evaluation.
    pub fn producer(name: impl Into<String>, datatype: DataType, producer: Producer) -> Self {
        Self {
            value: ValueSource::Producer(producer),
            ..Self::new(name, datatype, MetricValue::Null)
        }
    }

    /// Creates a metric whose value is produced asynchronously on each
    /// evaluation.
    pub fn async_producer(
        name: impl Into<String>,
        datatype: DataType,
        producer: AsyncProducer,
    ) -> Self {
        Self {
            value: ValueSource::AsyncProducer(producer),
            ..Self::new(name, datatype, MetricValue::Null)
        }
    }

    /// Sets the scan rate in milliseconds.
    pub fn with_scan_rate(mut self, scan_rate_ms: u64) -> Self {
        self.scan_rate = Some(scan_rate_ms);
        self
    }

    /// Sets the report-by-exception deadband.
    pub fn with_deadband(mut self, value: f64, max_time_ms: Option<u64>) -> Self {
        self.deadband = Some(Deadband {
            value,
            max_time: max_time_ms,
        });
        self
    }
}
