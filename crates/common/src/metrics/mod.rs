//! Metrics and observability utilities
//!
//! Prometheus metrics for orchestration runs, evidence sources and
//! judgment calls. Names follow `marag_<subject>_<unit>`.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all MARAG metrics
pub const METRICS_PREFIX: &str = "marag";

/// Buckets for whole-run latency (several model calls per run)
pub const RUN_BUCKETS: &[f64] = &[
    0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0, 180.0,
];

/// Buckets for a single source or model call
pub const CALL_BUCKETS: &[f64] = &[
    0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.00, 30.00,
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    describe_counter!(
        format!("{}_runs_total", METRICS_PREFIX),
        Unit::Count,
        "Orchestration runs by outcome"
    );

    describe_histogram!(
        format!("{}_run_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Orchestration run latency in seconds"
    );

    describe_counter!(
        format!("{}_transitions_total", METRICS_PREFIX),
        Unit::Count,
        "Phase transitions taken by the orchestrator"
    );

    describe_counter!(
        format!("{}_escalations_total", METRICS_PREFIX),
        Unit::Count,
        "Escalations from the document index to web search"
    );

    describe_counter!(
        format!("{}_source_invocations_total", METRICS_PREFIX),
        Unit::Count,
        "Evidence source calls by source and status"
    );

    describe_histogram!(
        format!("{}_source_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Evidence source latency in seconds"
    );

    describe_counter!(
        format!("{}_judgments_total", METRICS_PREFIX),
        Unit::Count,
        "Judgment calls by kind and status"
    );

    describe_histogram!(
        format!("{}_judgment_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Judgment call latency in seconds"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record a finished run; `outcome` is accepted, exhausted, failed or cancelled
pub fn record_run(duration_secs: f64, outcome: &str) {
    counter!(
        format!("{}_runs_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_run_duration_seconds", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .record(duration_secs);
}

pub fn record_transition(from: &str, to: &str) {
    counter!(
        format!("{}_transitions_total", METRICS_PREFIX),
        "from" => from.to_string(),
        "to" => to.to_string()
    )
    .increment(1);
}

pub fn record_escalation() {
    counter!(format!("{}_escalations_total", METRICS_PREFIX)).increment(1);
}

/// Record one evidence source call
pub fn record_source(duration_secs: f64, source: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_source_invocations_total", METRICS_PREFIX),
        "source" => source.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_source_duration_seconds", METRICS_PREFIX),
        "source" => source.to_string()
    )
    .record(duration_secs);
}

/// Record one judgment call
pub fn record_judgment(duration_secs: f64, kind: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_judgments_total", METRICS_PREFIX),
        "kind" => kind.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_judgment_duration_seconds", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .record(duration_secs);
}
