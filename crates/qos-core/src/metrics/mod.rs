//! # Metrics
//!
//! Counters and gauges recorded through the `metrics` facade. No exporter is installed here;
//! the embedding gateway installs whichever recorder it exposes. Without a recorder every
//! call is a no-op.
//!
//! | Metric | Kind | Labels |
//! |--------|------|--------|
//! | `qos_observations_applied_total` | counter | `service` |
//! | `qos_observations_rejected_total` | counter | `service`, `reason` |
//! | `qos_endpoint_failures_total` | counter | `service`, `kind` |
//! | `qos_endpoints_evicted_total` | counter | `service` |
//! | `qos_endpoints_tracked` | gauge | `service` |
//! | `qos_messages_dropped_total` | counter | `reason` |
//! | `qos_messages_lagged_total` | counter | `topic` |
//!
//! ## String Interning
//!
//! Service names and topics are interned so hot-path label construction does not allocate.
//! Both sets are bounded by configuration, so the leak is bounded too.

use crate::{errors::ResultErrorKind, types::ServiceId};
use dashmap::DashMap;
use metrics::{counter, gauge};
use std::sync::OnceLock;

static LABEL_POOL: OnceLock<DashMap<String, &'static str>> = OnceLock::new();

#[inline]
fn intern(label: &str) -> &'static str {
    let pool = LABEL_POOL.get_or_init(DashMap::new);

    if let Some(interned) = pool.get(label) {
        return *interned;
    }

    *pool.entry(label.to_string()).or_insert_with(|| Box::leak(label.to_string().into_boxed_str()))
}

pub fn record_observation_applied(service: &ServiceId) {
    counter!("qos_observations_applied_total", "service" => intern(service.as_str())).increment(1);
}

pub fn record_observation_rejected(service: &ServiceId, reason: &'static str) {
    counter!(
        "qos_observations_rejected_total",
        "service" => intern(service.as_str()),
        "reason" => reason
    )
    .increment(1);
}

pub fn record_endpoint_failure(service: &ServiceId, kind: ResultErrorKind) {
    counter!(
        "qos_endpoint_failures_total",
        "service" => intern(service.as_str()),
        "kind" => kind.as_str()
    )
    .increment(1);
}

pub fn record_endpoints_evicted(service: &ServiceId, count: usize) {
    counter!("qos_endpoints_evicted_total", "service" => intern(service.as_str()))
        .increment(count as u64);
}

#[allow(clippy::cast_precision_loss)]
pub fn record_tracked_endpoints(service: &ServiceId, count: usize) {
    gauge!("qos_endpoints_tracked", "service" => intern(service.as_str())).set(count as f64);
}

pub fn record_message_dropped(reason: &'static str) {
    counter!("qos_messages_dropped_total", "reason" => reason).increment(1);
}

pub fn record_messages_lagged(topic: &str, skipped: u64) {
    counter!("qos_messages_lagged_total", "topic" => intern(topic)).increment(skipped);
}
