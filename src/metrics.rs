//! Metrics instrumentation for gateway-dns.
//!
//! All metrics are prefixed with `gateway_dns.`

use metrics::{counter, gauge, histogram};
use std::time::Instant;

/// Record a DNS query.
pub fn record_query(record_type: &str, result: QueryResult, duration: std::time::Duration) {
    let result_str = match result {
        QueryResult::Success => "success",
        QueryResult::NxDomain => "nxdomain",
        QueryResult::NoData => "no_data",
    };

    counter!("gateway_dns.query.count", "type" => record_type.to_string(), "result" => result_str)
        .increment(1);
    histogram!("gateway_dns.query.duration.seconds", "type" => record_type.to_string())
        .record(duration.as_secs_f64());
}

/// Query result type for metrics.
#[derive(Debug, Clone, Copy)]
pub enum QueryResult {
    /// Query returned records successfully.
    Success,
    /// Name not found.
    NxDomain,
    /// Name known or type unsupported; negative answer without NXDOMAIN.
    NoData,
}

/// Record a watch event observed by a reconciliation loop.
pub fn record_watch_event(kind: &str, event_type: WatchEventType) {
    let event_str = match event_type {
        WatchEventType::Added => "added",
        WatchEventType::Modified => "modified",
        WatchEventType::Deleted => "deleted",
        WatchEventType::Other => "other",
    };

    counter!("gateway_dns.watch.event.count", "kind" => kind.to_string(), "event" => event_str)
        .increment(1);
}

/// Watch event types.
#[derive(Debug, Clone, Copy)]
pub enum WatchEventType {
    /// Resource created (or present when the watch opened).
    Added,
    /// Resource changed.
    Modified,
    /// Resource deleted.
    Deleted,
    /// Any other notification, ignored by the loop.
    Other,
}

/// Record a watch stream reopen.
pub fn record_watch_reopen(kind: &str, reason: ReopenReason) {
    let reason_str = match reason {
        ReopenReason::StreamEnded => "stream_ended",
        ReopenReason::Error => "error",
        ReopenReason::OpenFailed => "open_failed",
    };

    counter!("gateway_dns.watch.reopen.count", "kind" => kind.to_string(), "reason" => reason_str)
        .increment(1);
}

/// Reopen reasons.
#[derive(Debug, Clone, Copy)]
pub enum ReopenReason {
    /// Watch stream ended normally.
    StreamEnded,
    /// Watch stream raised an error.
    Error,
    /// Opening the stream failed.
    OpenFailed,
}

/// Record an existence-probe retry for a kind that is not yet registered.
pub fn record_probe_retry(kind: &str) {
    counter!("gateway_dns.probe.retry.count", "kind" => kind.to_string()).increment(1);
}

/// Record store gauges (call periodically or on change).
pub fn record_store_counts(records: usize, owners: usize) {
    gauge!("gateway_dns.store.records.count").set(records as f64);
    gauge!("gateway_dns.store.owners.count").set(owners as f64);
}

/// Record answers returned for a successful lookup.
pub fn record_answers_returned(count: usize) {
    histogram!("gateway_dns.query.answers_returned").record(count as f64);
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
