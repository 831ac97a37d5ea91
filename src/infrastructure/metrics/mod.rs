//! Prometheus Metrics Module
//!
//! Provides instance-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - Active WebSocket sessions
//! - Local deliveries by path (direct or relayed from the bus)
//! - Bus publish outcomes
//! - Envelopes dropped by loop or duplicate suppression

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Sessions currently open on this instance
pub static SESSIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new("sessions_active", "Number of open WebSocket sessions").namespace("chat_relay"),
    )
    .expect("Failed to create SESSIONS_ACTIVE metric")
});

/// Messages handed to local sessions
pub static DELIVERIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("deliveries_total", "Messages delivered to local sessions")
            .namespace("chat_relay"),
        &["path"], // "direct", "relay"
    )
    .expect("Failed to create DELIVERIES_TOTAL metric")
});

/// Bus publish attempts
pub static BUS_PUBLISH_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("bus_publish_total", "Envelopes published to the bus").namespace("chat_relay"),
        &["result"], // "ok", "error"
    )
    .expect("Failed to create BUS_PUBLISH_TOTAL metric")
});

/// Envelopes received but not re-broadcast
pub static ENVELOPES_SUPPRESSED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "envelopes_suppressed_total",
            "Bus envelopes dropped before local delivery",
        )
        .namespace("chat_relay"),
        &["reason"], // "own_origin", "duplicate", "malformed"
    )
    .expect("Failed to create ENVELOPES_SUPPRESSED_TOTAL metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(SESSIONS_ACTIVE.clone()))
        .expect("Failed to register SESSIONS_ACTIVE");
    registry
        .register(Box::new(DELIVERIES_TOTAL.clone()))
        .expect("Failed to register DELIVERIES_TOTAL");
    registry
        .register(Box::new(BUS_PUBLISH_TOTAL.clone()))
        .expect("Failed to register BUS_PUBLISH_TOTAL");
    registry
        .register(Box::new(ENVELOPES_SUPPRESSED_TOTAL.clone()))
        .expect("Failed to register ENVELOPES_SUPPRESSED_TOTAL");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn set_sessions_active(count: usize) {
    SESSIONS_ACTIVE.set(count as i64);
}

pub fn record_deliveries(path: &str, count: usize) {
    DELIVERIES_TOTAL
        .with_label_values(&[path])
        .inc_by(count as u64);
}

pub fn record_bus_publish(ok: bool) {
    BUS_PUBLISH_TOTAL
        .with_label_values(&[if ok { "ok" } else { "error" }])
        .inc();
}

pub fn record_suppressed(reason: &str) {
    ENVELOPES_SUPPRESSED_TOTAL.with_label_values(&[reason]).inc();
}
