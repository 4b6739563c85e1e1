//! Prometheus metrics for the HTTP surface.
//!
//! Covers request latency and counts, authentication failures and the
//! live-view WebSocket. Queue and store metrics live in
//! `queueline_core::metrics` and are registered here alongside.

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use regex_lite::Regex;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "queueline_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("queueline_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "queueline_http_requests_in_flight",
        "HTTP requests currently being processed",
    )
    .unwrap()
});

/// Rejected credentials, by reason.
pub static AUTH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("queueline_auth_failures_total", "Authentication failures"),
        &["reason"],
    )
    .unwrap()
});

// =============================================================================
// WebSocket Metrics
// =============================================================================

pub static WS_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "queueline_ws_connections_active",
        "Open live-view WebSocket connections",
    )
    .unwrap()
});

pub static WS_CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "queueline_ws_connections_total",
        "WebSocket connections since startup",
    )
    .unwrap()
});

pub static WS_MESSAGES_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("queueline_ws_messages_sent_total", "WebSocket messages sent"),
        &["type"],
    )
    .unwrap()
});

/// Times a client fell behind the broadcast channel and skipped messages.
pub static WS_LAG_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "queueline_ws_lag_events_total",
        "WebSocket lag events (client fell behind)",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(HTTP_REQUEST_DURATION.clone()),
        Box::new(HTTP_REQUESTS_TOTAL.clone()),
        Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()),
        Box::new(AUTH_FAILURES_TOTAL.clone()),
        Box::new(WS_CONNECTIONS_ACTIVE.clone()),
        Box::new(WS_CONNECTIONS_TOTAL.clone()),
        Box::new(WS_MESSAGES_SENT.clone()),
        Box::new(WS_LAG_EVENTS.clone()),
    ];

    for collector in collectors
        .into_iter()
        .chain(queueline_core::metrics::all_metrics())
    {
        if let Err(e) = registry.register(collector) {
            tracing::error!("Failed to register metric: {}", e);
        }
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

static UUID_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});

/// Collapse ticket ids in a path so metric label cardinality stays bounded.
pub fn normalize_path(path: &str) -> String {
    if !path.starts_with("/api/v1/tickets/") {
        return UUID_SEGMENT.replace_all(path, "{id}").into_owned();
    }
    // Any ticket id, well-formed or not, is one label.
    "/api/v1/tickets/{id}".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_ticket_path() {
        assert_eq!(
            normalize_path("/api/v1/tickets/550e8400-e29b-41d4-a716-446655440000"),
            "/api/v1/tickets/{id}"
        );
        assert_eq!(normalize_path("/api/v1/tickets/garbage"), "/api/v1/tickets/{id}");
    }

    #[test]
    fn test_normalize_leaves_static_paths() {
        assert_eq!(normalize_path("/api/v1/queue/advance"), "/api/v1/queue/advance");
        assert_eq!(normalize_path("/api/v1/tickets"), "/api/v1/tickets");
        assert_eq!(normalize_path("/metrics"), "/metrics");
    }

    #[test]
    fn test_normalize_uuid_elsewhere() {
        assert_eq!(
            normalize_path("/other/550e8400-e29b-41d4-a716-446655440000/x"),
            "/other/{id}/x"
        );
    }

    #[test]
    fn test_encoded_output_has_http_and_core_metrics() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();
        queueline_core::metrics::TICKETS_ISSUED.inc();

        let output = encode_metrics();
        assert!(output.contains("# HELP"));
        assert!(output.contains("queueline_http_requests_total"));
        assert!(output.contains("queueline_tickets_issued_total"));
    }
}
