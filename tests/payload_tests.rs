//! Payload codec tests: round trips, compression envelope, 64-bit carry.

use prost::Message;
use sparkplug_client::payload::ALGORITHM_METRIC;
use sparkplug_client::{
    proto, CompressionAlgorithm, DataType, Error, MetricSnapshot, MetricValue, Payload,
    PayloadCodec, PayloadOptions,
};

fn all_scalar_types() -> Vec<MetricSnapshot> {
    vec![
        MetricSnapshot::new("i8", DataType::Int8, MetricValue::Int8(-42)),
        MetricSnapshot::new("i16", DataType::Int16, MetricValue::Int16(-1234)),
        MetricSnapshot::new("i32", DataType::Int32, MetricValue::Int32(-123456)),
        MetricSnapshot::new("i64", DataType::Int64, MetricValue::Int64(i64::MIN)),
        MetricSnapshot::new("u8", DataType::UInt8, MetricValue::UInt8(255)),
        MetricSnapshot::new("u16", DataType::UInt16, MetricValue::UInt16(65535)),
        MetricSnapshot::new("u32", DataType::UInt32, MetricValue::UInt32(u32::MAX)),
        MetricSnapshot::new("u64", DataType::UInt64, MetricValue::UInt64(u64::MAX)),
        MetricSnapshot::new("f32", DataType::Float, MetricValue::Float(std::f32::consts::PI)),
        MetricSnapshot::new("f64", DataType::Double, MetricValue::Double(std::f64::consts::E)),
        MetricSnapshot::new("b", DataType::Boolean, MetricValue::Boolean(true)),
        MetricSnapshot::new("s", DataType::String, MetricValue::String("hello".to_string())),
        MetricSnapshot::new("n", DataType::Int32, MetricValue::Null),
    ]
}

#[test]
fn test_encode_decode_round_trip() {
    let codec = PayloadCodec::default();
    let mut payload = Payload::now(all_scalar_types());
    payload.seq = Some(17);

    let decoded = codec.decode(&codec.encode(&payload).unwrap()).unwrap();
    assert_eq!(decoded, payload);
}

#[test]
fn test_compressed_round_trip_both_algorithms() {
    for algorithm in [CompressionAlgorithm::Gzip, CompressionAlgorithm::Deflate] {
        let codec = PayloadCodec::new(PayloadOptions {
            compress: true,
            algorithm,
        });
        let mut payload = Payload::now(all_scalar_types());
        payload.seq = Some(3);

        let bytes = codec.encode(&payload).unwrap();
        // Any codec decodes the envelope, compression configured or not.
        let decoded = PayloadCodec::default().decode(&bytes).unwrap();
        assert_eq!(decoded, payload, "round trip failed for {:?}", algorithm);
    }
}

#[test]
fn test_compressed_envelope_shape() {
    let codec = PayloadCodec::new(PayloadOptions {
        compress: true,
        algorithm: CompressionAlgorithm::Gzip,
    });
    let payload = Payload::now(vec![MetricSnapshot::new(
        "a",
        DataType::UInt64,
        MetricValue::UInt64(12345),
    )]);
    let bytes = codec.encode(&payload).unwrap();

    // The outer payload carries exactly the algorithm metric and a body.
    let outer = proto::Payload::decode(&bytes[..]).unwrap();
    assert!(outer.body.is_some());
    assert_eq!(outer.metrics.len(), 1);
    assert_eq!(outer.metrics[0].name.as_deref(), Some(ALGORITHM_METRIC));
    assert_eq!(
        outer.metrics[0].value,
        Some(proto::metric::Value::StringValue("GZIP".to_string()))
    );

    let decoded = codec.decode(&bytes).unwrap();
    assert_eq!(decoded.metric("a").unwrap().value, MetricValue::UInt64(12345));
}

#[test]
fn test_unknown_algorithm_fails_decode() {
    // Hand-build an envelope with an unrecognised algorithm token.
    let envelope = proto::Payload {
        timestamp: Some(1),
        metrics: vec![proto::Metric {
            name: Some(ALGORITHM_METRIC.to_string()),
            datatype: Some(DataType::String.code()),
            value: Some(proto::metric::Value::StringValue("LZ4".to_string())),
            ..Default::default()
        }],
        seq: None,
        uuid: None,
        body: Some(vec![1, 2, 3]),
    };
    let result = PayloadCodec::default().decode(&envelope.encode_to_vec());
    assert!(matches!(result, Err(Error::InvalidPayload(_))));
}

#[test]
fn test_algorithm_tokens_case_insensitive() {
    let envelope_for = |token: &str, body: Vec<u8>| proto::Payload {
        timestamp: Some(1),
        metrics: vec![proto::Metric {
            name: Some(ALGORITHM_METRIC.to_string()),
            datatype: Some(DataType::String.code()),
            value: Some(proto::metric::Value::StringValue(token.to_string())),
            ..Default::default()
        }],
        seq: None,
        uuid: None,
        body: Some(body),
    };

    // Compress a trivial inner payload through the codec, then re-tag the
    // envelope with a lowercase token.
    let codec = PayloadCodec::new(PayloadOptions {
        compress: true,
        algorithm: CompressionAlgorithm::Gzip,
    });
    let inner = Payload::now(vec![MetricSnapshot::new(
        "x",
        DataType::Int32,
        MetricValue::Int32(1),
    )]);
    let compressed = proto::Payload::decode(&codec.encode(&inner).unwrap()[..]).unwrap();
    let retagged = envelope_for("gzip", compressed.body.unwrap());

    let decoded = PayloadCodec::default()
        .decode(&retagged.encode_to_vec())
        .unwrap();
    assert_eq!(decoded.metric("x").unwrap().value, MetricValue::Int32(1));
}

#[test]
fn test_corrupt_compressed_body_fails_decode() {
    let envelope = proto::Payload {
        timestamp: Some(1),
        metrics: vec![proto::Metric {
            name: Some(ALGORITHM_METRIC.to_string()),
            datatype: Some(DataType::String.code()),
            value: Some(proto::metric::Value::StringValue("GZIP".to_string())),
            ..Default::default()
        }],
        seq: None,
        uuid: None,
        body: Some(vec![0xDE, 0xAD, 0xBE, 0xEF]),
    };
    let result = PayloadCodec::default().decode(&envelope.encode_to_vec());
    assert!(matches!(result, Err(Error::InvalidPayload(_))));
}

#[test]
fn test_large_integers_are_not_truncated() {
    // Values above 2^53 cannot survive an f64 detour; they must arrive
    // bit-exact.
    let codec = PayloadCodec::default();
    let over_f64 = (1u64 << 53) + 1;
    let payload = Payload::now(vec![
        MetricSnapshot::new("u", DataType::UInt64, MetricValue::UInt64(over_f64)),
        MetricSnapshot::new(
            "i",
            DataType::Int64,
            MetricValue::Int64(-((1i64 << 53) + 1)),
        ),
    ]);

    let decoded = codec.decode(&codec.encode(&payload).unwrap()).unwrap();
    assert_eq!(decoded.metric("u").unwrap().value, MetricValue::UInt64(over_f64));
    assert_eq!(
        decoded.metric("i").unwrap().value,
        MetricValue::Int64(-((1i64 << 53) + 1))
    );
}

#[test]
fn test_null_metric_survives_round_trip() {
    let codec = PayloadCodec::default();
    let payload = Payload::now(vec![MetricSnapshot::new(
        "n",
        DataType::Double,
        MetricValue::Null,
    )]);
    let decoded = codec.decode(&codec.encode(&payload).unwrap()).unwrap();
    assert!(decoded.metric("n").unwrap().value.is_null());
}

#[test]
fn test_decode_garbage_fails() {
    let result = PayloadCodec::default().decode(&[0xFF, 0xFF, 0xFF, 0xFF]);
    assert!(result.is_err());
}
