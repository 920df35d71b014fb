//! Sparkplug B protobuf wire schema.
//!
//! Message definitions mirroring `sparkplug_b.proto`, restricted to the parts
//! of the schema this crate speaks: scalar metrics, property sets, and the
//! payload envelope. Encoding and decoding are delegated to `prost`.

/// A Sparkplug B payload as it appears on the wire.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Payload {
    /// Timestamp at message sending time, in milliseconds since Unix epoch.
    #[prost(uint64, optional, tag = "1")]
    pub timestamp: ::core::option::Option<u64>,
    /// Repeated metric payload entries.
    #[prost(message, repeated, tag = "2")]
    pub metrics: ::prost::alloc::vec::Vec<Metric>,
    /// Sequence number, 0..255.
    #[prost(uint64, optional, tag = "3")]
    pub seq: ::core::option::Option<u64>,
    /// Payload UUID.
    #[prost(string, optional, tag = "4")]
    pub uuid: ::core::option::Option<::prost::alloc::string::String>,
    /// Opaque body; carries the compressed inner payload when an
    /// `algorithm` metric is present.
    #[prost(bytes = "vec", optional, tag = "5")]
    pub body: ::core::option::Option<::prost::alloc::vec::Vec<u8>>,
}

/// A single metric on the wire.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Metric {
    /// Metric name.
    #[prost(string, optional, tag = "1")]
    pub name: ::core::option::Option<::prost::alloc::string::String>,
    /// Metric alias.
    #[prost(uint64, optional, tag = "2")]
    pub alias: ::core::option::Option<u64>,
    /// Timestamp in milliseconds since Unix epoch.
    #[prost(uint64, optional, tag = "3")]
    pub timestamp: ::core::option::Option<u64>,
    /// Sparkplug data type code.
    #[prost(uint32, optional, tag = "4")]
    pub datatype: ::core::option::Option<u32>,
    /// Whether this value is historical.
    #[prost(bool, optional, tag = "5")]
    pub is_historical: ::core::option::Option<bool>,
    /// Whether this value is transient.
    #[prost(bool, optional, tag = "6")]
    pub is_transient: ::core::option::Option<bool>,
    /// Whether the value is null.
    #[prost(bool, optional, tag = "7")]
    pub is_null: ::core::option::Option<bool>,
    /// Metric metadata.
    #[prost(message, optional, tag = "8")]
    pub metadata: ::core::option::Option<MetaData>,
    /// Metric properties.
    #[prost(message, optional, tag = "9")]
    pub properties: ::core::option::Option<PropertySet>,
    /// The metric value.
    #[prost(oneof = "metric::Value", tags = "10, 11, 12, 13, 14, 15, 16")]
    pub value: ::core::option::Option<metric::Value>,
}

/// Nested types for [`Metric`].
pub mod metric {
    /// The metric value variants.
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        /// 8/16/32-bit integer value.
        #[prost(uint32, tag = "10")]
        IntValue(u32),
        /// 64-bit integer value (signed values are two's complement).
        #[prost(uint64, tag = "11")]
        LongValue(u64),
        /// 32-bit floating point value.
        #[prost(float, tag = "12")]
        FloatValue(f32),
        /// 64-bit floating point value.
        #[prost(double, tag = "13")]
        DoubleValue(f64),
        /// Boolean value.
        #[prost(bool, tag = "14")]
        BooleanValue(bool),
        /// String value.
        #[prost(string, tag = "15")]
        StringValue(::prost::alloc::string::String),
        /// Raw bytes value.
        #[prost(bytes, tag = "16")]
        BytesValue(::prost::alloc::vec::Vec<u8>),
    }
}

/// Metadata attached to a metric.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MetaData {
    /// Whether the metric is part of a multi-part message.
    #[prost(bool, optional, tag = "1")]
    pub is_multi_part: ::core::option::Option<bool>,
    /// Content type of the metric value.
    #[prost(string, optional, tag = "2")]
    pub content_type: ::core::option::Option<::prost::alloc::string::String>,
    /// Size in bytes.
    #[prost(uint64, optional, tag = "3")]
    pub size: ::core::option::Option<u64>,
    /// Multi-part sequence number.
    #[prost(uint64, optional, tag = "4")]
    pub seq: ::core::option::Option<u64>,
    /// File name, for file metrics.
    #[prost(string, optional, tag = "5")]
    pub file_name: ::core::option::Option<::prost::alloc::string::String>,
    /// File type, for file metrics.
    #[prost(string, optional, tag = "6")]
    pub file_type: ::core::option::Option<::prost::alloc::string::String>,
    /// MD5 checksum of the value.
    #[prost(string, optional, tag = "7")]
    pub md5: ::core::option::Option<::prost::alloc::string::String>,
    /// Free-form description.
    #[prost(string, optional, tag = "8")]
    pub description: ::core::option::Option<::prost::alloc::string::String>,
}

/// A set of named properties attached to a metric.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PropertySet {
    /// Property names, index-aligned with `values`.
    #[prost(string, repeated, tag = "1")]
    pub keys: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    /// Property values, index-aligned with `keys`.
    #[prost(message, repeated, tag = "2")]
    pub values: ::prost::alloc::vec::Vec<PropertyValue>,
}

/// A single property value.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PropertyValue {
    /// Sparkplug data type code of the property.
    #[prost(uint32, optional, tag = "1")]
    pub r#type: ::core::option::Option<u32>,
    /// Whether the property value is null.
    #[prost(bool, optional, tag = "2")]
    pub is_null: ::core::option::Option<bool>,
    /// The property value.
    #[prost(oneof = "property_value::Value", tags = "3, 4, 5, 6, 7, 8, 9")]
    pub value: ::core::option::Option<property_value::Value>,
}

/// Nested types for [`PropertyValue`].
pub mod property_value {
    /// The property value variants.
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        /// 8/16/32-bit integer value.
        #[prost(uint32, tag = "3")]
        IntValue(u32),
        /// 64-bit integer value.
        #[prost(uint64, tag = "4")]
        LongValue(u64),
        /// 32-bit floating point value.
        #[prost(float, tag = "5")]
        FloatValue(f32),
        /// 64-bit floating point value.
        #[prost(double, tag = "6")]
        DoubleValue(f64),
        /// Boolean value.
        #[prost(bool, tag = "7")]
        BooleanValue(bool),
        /// String value.
        #[prost(string, tag = "8")]
        StringValue(::prost::alloc::string::String),
        /// Nested property set.
        #[prost(message, tag = "9")]
        PropertysetValue(super::PropertySet),
    }
}
