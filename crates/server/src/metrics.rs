//! Prometheus metrics for the broker.
use axum::{
    extract::Request, http::StatusCode, middleware::Next,
    response::Response,
};
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    TextEncoder,
};
use std::time::Instant;

pub(crate) static SESSIONS_CREATED: Lazy<IntCounter> =
    Lazy::new(|| {
        prometheus::register_int_counter!(
            "signaling_sessions",
            "The total number of created sessions"
        )
        .expect("failed to register metric")
    });

pub(crate) static CONNECTIONS_CREATED: Lazy<IntCounter> =
    Lazy::new(|| {
        prometheus::register_int_counter!(
            "signaling_connections",
            "The total number of created connections"
        )
        .expect("failed to register metric")
    });

pub(crate) static MESSAGES_RECEIVED: Lazy<IntCounterVec> =
    Lazy::new(|| {
        prometheus::register_int_counter_vec!(
            "signaling_messages",
            "The total number of messages exchanged",
            &["type"]
        )
        .expect("failed to register metric")
    });

pub(crate) static ACTIVE_SESSIONS: Lazy<IntGauge> = Lazy::new(|| {
    prometheus::register_int_gauge!(
        "signaling_active_sessions",
        "The total number of active sessions"
    )
    .expect("failed to register metric")
});

pub(crate) static ACTIVE_PEERS: Lazy<IntGauge> = Lazy::new(|| {
    prometheus::register_int_gauge!(
        "signaling_active_peers",
        "The total number of active peers"
    )
    .expect("failed to register metric")
});

static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    prometheus::register_int_counter_vec!(
        "http_requests_total",
        "Count of all HTTP requests",
        &["code", "method"]
    )
    .expect("failed to register metric")
});

static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    prometheus::register_histogram_vec!(
        "http_request_duration_seconds",
        "Duration of all HTTP requests",
        &["code", "method"]
    )
    .expect("failed to register metric")
});

/// Middleware recording a counter and duration histogram for every
/// request.
pub(crate) async fn track_http(
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let labels =
        [response.status().as_str().to_owned(), method.to_string()];
    let labels: Vec<&str> =
        labels.iter().map(String::as_str).collect();
    HTTP_REQUESTS_TOTAL.with_label_values(&labels).inc();
    HTTP_REQUEST_DURATION
        .with_label_values(&labels)
        .observe(start.elapsed().as_secs_f64());

    response
}

/// Render the default registry in the Prometheus text format.
pub(crate) async fn scrape() -> Result<String, StatusCode> {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    String::from_utf8(buffer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
