//! Metrics instrumentation for traffic-dns.
//!
//! All metrics are prefixed with `traffic_dns.`

use metrics::{counter, gauge, histogram};
use std::time::Instant;

/// Record a DNS query.
pub fn record_query(record_type: &str, result: QueryResult, duration: std::time::Duration) {
    let result_str = match result {
        QueryResult::Success => "success",
        QueryResult::NxDomain => "nxdomain",
        QueryResult::NoData => "nodata",
    };

    counter!("traffic_dns.query.count", "type" => record_type.to_string(), "result" => result_str)
        .increment(1);
    histogram!("traffic_dns.query.duration.seconds", "type" => record_type.to_string())
        .record(duration.as_secs_f64());
}

/// Query result type for metrics.
#[derive(Debug, Clone, Copy)]
pub enum QueryResult {
    /// Query returned records.
    Success,
    /// Name does not exist.
    NxDomain,
    /// Name exists but has no records of the requested type.
    NoData,
}

/// Record SRV records returned for a cluster.
pub fn record_srv_records_returned(count: usize) {
    histogram!("traffic_dns.query.srv.records_returned").record(count as f64);
}

/// Record an assignment file reload attempt.
pub fn record_reload(outcome: ReloadOutcome) {
    let outcome_str = match outcome {
        ReloadOutcome::Loaded => "loaded",
        ReloadOutcome::Unchanged => "unchanged",
        ReloadOutcome::ReadError => "read_error",
        ReloadOutcome::ParseError => "parse_error",
    };

    counter!("traffic_dns.source.reload.count", "outcome" => outcome_str).increment(1);
}

/// Outcome of an assignment reload.
#[derive(Debug, Clone, Copy)]
pub enum ReloadOutcome {
    /// New assignments were applied.
    Loaded,
    /// The file had not changed.
    Unchanged,
    /// The file could not be read.
    ReadError,
    /// The file was read but is invalid.
    ParseError,
}

/// Record state counts (call periodically or on change).
pub fn record_state_counts(clusters: usize, endpoints: usize, healthy_endpoints: usize) {
    gauge!("traffic_dns.state.clusters.count").set(clusters as f64);
    gauge!("traffic_dns.state.endpoints.count").set(endpoints as f64);
    gauge!("traffic_dns.state.endpoints.healthy").set(healthy_endpoints as f64);
}

/// Record readiness state.
pub fn record_ready_state(ready: bool) {
    gauge!("traffic_dns.state.ready").set(if ready { 1.0 } else { 0.0 });
}

/// Record the assignment version.
pub fn record_version(version: u64) {
    gauge!("traffic_dns.state.version").set(version as f64);
}

/// Helper for timing operations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}
