//! Publish scheduling: scan rates and the report-by-exception gate.
//!
//! The edge node installs one recurring timer per distinct scan rate across
//! its metrics (node-owned and device-owned). Each tick evaluates the
//! metrics bound to that rate, applies the report-by-exception gate, and
//! batches whatever qualifies into one NDATA plus one DDATA per device.

use std::collections::{BTreeMap, BTreeSet};

use crate::payload::MetricSnapshot;
use crate::types::{Metric, MetricValue};

/// Decides whether a metric's current value qualifies for publishing.
///
/// A metric qualifies when any of the following hold:
/// - it has never been published, or the last published value was null;
/// - it is numeric with a deadband, and the change exceeds the deadband
///   value or the deadband's `max_time` has elapsed since the last publish;
/// - otherwise (non-numeric, or numeric without a deadband), the current
///   value differs from the last published value.
pub fn should_publish(metric: &Metric, current: &MetricValue, now_ms: u64) -> bool {
    let last = match &metric.last_published {
        None => return true,
        Some(last) => last,
    };
    if last.value.is_null() {
        return true;
    }

    if metric.datatype.is_numeric() {
        if let Some(deadband) = &metric.deadband {
            let (Some(cur), Some(prev)) = (current.as_f64(), last.value.as_f64()) else {
                return true;
            };
            if (cur - prev).abs() > deadband.value {
                return true;
            }
            if let Some(max_time) = deadband.max_time {
                if now_ms.saturating_sub(last.timestamp) > max_time {
                    return true;
                }
            }
            return false;
        }
    }

    *current != last.value
}

/// Collects the distinct scan rates configured across a metric set.
pub(crate) fn distinct_scan_rates<'a>(
    metrics: impl Iterator<Item = &'a Metric>,
) -> BTreeSet<u64> {
    metrics.filter_map(|m| m.scan_rate).collect()
}

/// Evaluates the metrics bound to `scan_rate` and returns the snapshots
/// that pass the report-by-exception gate, each stamped with `now_ms`.
///
/// Producer values are resolved here so one tick produces one consistent
/// snapshot; `last_published` is untouched until the publish succeeds
/// (see [`mark_published`]).
pub(crate) async fn collect_due(
    metrics: &BTreeMap<String, Metric>,
    scan_rate: u64,
    now_ms: u64,
) -> Vec<MetricSnapshot> {
    let mut due = Vec::new();
    for metric in metrics.values() {
        if metric.scan_rate != Some(scan_rate) {
            continue;
        }
        let current = metric.value.evaluate().await;
        if should_publish(metric, &current, now_ms) {
            let mut snapshot = MetricSnapshot::new(metric.name.clone(), metric.datatype, current)
                .with_timestamp(now_ms);
            snapshot.properties = metric.properties.clone();
            due.push(snapshot);
        }
    }
    due
}

/// Records what actually went out on the wire.
pub(crate) fn mark_published(
    metrics: &mut BTreeMap<String, Metric>,
    sent: &[MetricSnapshot],
    now_ms: u64,
) {
    for snapshot in sent {
        let Some(name) = snapshot.name.as_deref() else {
            continue;
        };
        if let Some(metric) = metrics.get_mut(name) {
            metric.last_published = Some(crate::types::LastPublished {
                timestamp: now_ms,
                value: snapshot.value.clone(),
            });
        }
    }
}
