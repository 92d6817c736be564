//! Prometheus Metrics Module
//!
//! Provides application-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - HTTP request counts by method, path, and status
//! - HTTP request latency histograms
//! - Hub connection gauges
//! - Hub event deliveries by event name and outcome
//! - Friendship transitions by action
//! - Database pool gauges

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

const NAMESPACE: &str = "community_hub";

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// HTTP request counter - tracks total requests by method, path, and status code
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests").namespace(NAMESPACE),
        &["method", "path", "status"],
    )
    .expect("Failed to create HTTP_REQUESTS_TOTAL metric")
});

/// HTTP request latency histogram - tracks request duration in seconds
pub static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
    HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        )
        .namespace(NAMESPACE)
        .buckets(buckets),
        &["method", "path"],
    )
    .expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric")
});

/// Live hub connections
pub static HUB_CONNECTIONS_ACTIVE: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(
        Opts::new("hub_connections_active", "Number of live hub connections").namespace(NAMESPACE),
        &["state"], // "connected", "identified"
    )
    .expect("Failed to create HUB_CONNECTIONS_ACTIVE metric")
});

/// Per-connection event deliveries
pub static HUB_EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("hub_events_total", "Hub event deliveries to connections").namespace(NAMESPACE),
        &["event", "outcome"], // outcome: "delivered", "failed"
    )
    .expect("Failed to create HUB_EVENTS_TOTAL metric")
});

pub static FRIENDSHIP_TRANSITIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "friendship_transitions_total",
            "Successful friendship state transitions",
        )
        .namespace(NAMESPACE),
        &["action"],
    )
    .expect("Failed to create FRIENDSHIP_TRANSITIONS_TOTAL metric")
});

/// Database connection pool stats
pub static DB_POOL_CONNECTIONS: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(
        Opts::new("db_pool_connections", "Database connection pool statistics").namespace(NAMESPACE),
        &["state"], // "idle", "active", "max"
    )
    .expect("Failed to create DB_POOL_CONNECTIONS metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(HTTP_REQUESTS_TOTAL.clone()),
        Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()),
        Box::new(HUB_CONNECTIONS_ACTIVE.clone()),
        Box::new(HUB_EVENTS_TOTAL.clone()),
        Box::new(FRIENDSHIP_TRANSITIONS_TOTAL.clone()),
        Box::new(DB_POOL_CONNECTIONS.clone()),
    ];

    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            tracing::error!(error = %e, "Failed to register metric");
        }
    }
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
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Helper to record HTTP request metrics
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status = status.to_string();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, status.as_str()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration_secs);
}

/// Helper to update hub connection counts
pub fn set_hub_connections(connected: usize, identified: usize) {
    HUB_CONNECTIONS_ACTIVE
        .with_label_values(&["connected"])
        .set(connected as f64);
    HUB_CONNECTIONS_ACTIVE
        .with_label_values(&["identified"])
        .set(identified as f64);
}

/// Record the outcome of one fan-out.
pub fn record_hub_delivery(event: &str, delivered: usize, failed: usize) {
    if delivered > 0 {
        HUB_EVENTS_TOTAL
            .with_label_values(&[event, "delivered"])
            .inc_by(delivered as u64);
    }
    if failed > 0 {
        HUB_EVENTS_TOTAL
            .with_label_values(&[event, "failed"])
            .inc_by(failed as u64);
    }
}

pub fn record_friendship_transition(action: &str) {
    FRIENDSHIP_TRANSITIONS_TOTAL.with_label_values(&[action]).inc();
}

/// Helper to update database pool stats
pub fn update_db_pool_stats(idle: u32, active: u32, max: u32) {
    DB_POOL_CONNECTIONS
        .with_label_values(&["idle"])
        .set(idle as f64);
    DB_POOL_CONNECTIONS
        .with_label_values(&["active"])
        .set(active as f64);
    DB_POOL_CONNECTIONS
        .with_label_values(&["max"])
        .set(max as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_metrics() {
        record_http_request("GET", "/health", 200, 0.001);
        let metrics = gather_metrics();
        assert!(metrics.contains("community_hub_http_requests_total"));
    }

    #[test]
    fn test_record_hub_delivery() {
        record_hub_delivery("FriendOnline", 2, 1);
        let metrics = gather_metrics();
        assert!(metrics.contains("community_hub_hub_events_total"));
        assert!(metrics.contains("outcome=\"failed\""));
    }

    #[test]
    fn test_record_friendship_transition() {
        record_friendship_transition("accept");
        assert!(gather_metrics().contains("action=\"accept\""));
    }
}
