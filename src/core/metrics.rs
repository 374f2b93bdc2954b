//! Prometheus metrics for monitoring the chat stream server.
//!
//! This module provides a centralized metrics registry for HTTP requests and
//! for the lifecycle of relayed SSE streams.

use prometheus::{
    register_gauge_vec, register_histogram_vec, register_int_counter_vec, GaugeVec, HistogramVec,
    IntCounterVec,
};
use std::sync::OnceLock;

/// Container for all application metrics.
pub struct Metrics {
    /// Total number of requests by method, endpoint and status
    pub request_count: IntCounterVec,

    /// Request duration histogram in seconds (time to response head for streams)
    pub request_duration: HistogramVec,

    /// Number of SSE streams currently being relayed, by provider
    pub active_streams: GaugeVec,

    /// SSE frames written to clients, by provider and event name
    pub stream_events: IntCounterVec,

    /// Finished streams by provider and outcome (done, error, disconnect)
    pub stream_outcomes: IntCounterVec,

    /// Time from stream start to the first fragment, in seconds
    pub time_to_first_fragment: HistogramVec,

    /// Non-streaming provider call latency in seconds
    pub provider_latency: HistogramVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Initialize the metrics registry.
///
/// Subsequent calls return the same instance.
///
/// # Examples
///
/// ```no_run
/// use chat_stream_server::core::metrics::init_metrics;
///
/// let metrics = init_metrics();
/// metrics.request_count.with_label_values(&["GET", "/health", "200"]).inc();
/// ```
pub fn init_metrics() -> &'static Metrics {
    METRICS.get_or_init(|| {
        let request_count = register_int_counter_vec!(
            "chat_stream_requests_total",
            "Total number of requests",
            &["method", "endpoint", "status_code"]
        )
        .expect("Failed to register request_count metric");

        let request_duration = register_histogram_vec!(
            "chat_stream_request_duration_seconds",
            "Request duration in seconds",
            &["method", "endpoint"],
            vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]
        )
        .expect("Failed to register request_duration metric");

        let active_streams = register_gauge_vec!(
            "chat_stream_active_streams",
            "Number of SSE streams currently being relayed",
            &["provider"]
        )
        .expect("Failed to register active_streams metric");

        let stream_events = register_int_counter_vec!(
            "chat_stream_events_total",
            "SSE frames written to clients",
            &["provider", "event"]
        )
        .expect("Failed to register stream_events metric");

        let stream_outcomes = register_int_counter_vec!(
            "chat_stream_outcomes_total",
            "Finished SSE streams by outcome",
            &["provider", "outcome"]
        )
        .expect("Failed to register stream_outcomes metric");

        let time_to_first_fragment = register_histogram_vec!(
            "chat_stream_time_to_first_fragment_seconds",
            "Time from stream start to the first fragment in seconds",
            &["provider"],
            vec![0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0, 10.0]
        )
        .expect("Failed to register time_to_first_fragment metric");

        let provider_latency = register_histogram_vec!(
            "chat_stream_provider_latency_seconds",
            "Non-streaming provider call latency in seconds",
            &["provider"],
            vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]
        )
        .expect("Failed to register provider_latency metric");

        Metrics {
            request_count,
            request_duration,
            active_streams,
            stream_events,
            stream_outcomes,
            time_to_first_fragment,
            provider_latency,
        }
    })
}

/// Get the global metrics instance, initializing it on first use.
pub fn get_metrics() -> &'static Metrics {
    init_metrics()
}
