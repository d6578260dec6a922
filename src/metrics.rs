// src/metrics.rs

#[cfg(feature = "observability")]
pub use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

// NOTE: When observability feature is disabled, provide stub implementations
#[cfg(not(feature = "observability"))]
pub enum Unit {}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! counter {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
    ($name:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! gauge {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! histogram {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_counter {
    ($name:expr, $unit:expr, $desc:expr) => {};
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_gauge {
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_histogram {
    ($name:expr, $unit:expr, $desc:expr) => {};
    ($name:expr, $desc:expr) => {};
}

// Re-export macros for use in this module when observability is disabled
#[cfg(not(feature = "observability"))]
use crate::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

/// Initializes the descriptions for all the metrics in the application.
/// This should be called once at startup.
pub fn describe_metrics() {
    // Liveness / heartbeat
    describe_gauge!("registry_up", "Registry process liveness (1=up).");
    describe_gauge!(
        "registry_heartbeat_unix_seconds",
        "Last heartbeat timestamp (unix seconds)."
    );

    // Write-path metrics
    describe_counter!(
        "registry_record_writes_total",
        Unit::Count,
        "Total successful record writes, labeled by record kind (token/protocol) and path (submit/update)."
    );
    describe_counter!(
        "registry_writes_rejected_total",
        Unit::Count,
        "Total rejected mutations, labeled by reason (unauthorized, owner_only)."
    );

    // Authorization metrics
    describe_counter!(
        "registry_writer_grants_total",
        Unit::Count,
        "Total writer grants that changed membership, labeled by role."
    );
    describe_counter!(
        "registry_writer_revocations_total",
        Unit::Count,
        "Total writer revocations that changed membership, labeled by role."
    );

    // Record inventory
    describe_gauge!(
        "registry_token_records",
        "Current number of token records in the registry."
    );
    describe_gauge!(
        "registry_protocol_records",
        "Current number of protocol records in the registry."
    );

    // Event stream
    describe_counter!(
        "registry_events_published_total",
        Unit::Count,
        "Total change notifications published to the event stream."
    );
    describe_gauge!(
        "registry_event_subscribers",
        "Current number of active event-stream subscribers."
    );

    // Persistence
    describe_counter!(
        "registry_rows_persisted_total",
        Unit::Count,
        "Total rows written through to the database, labeled by table."
    );
    describe_histogram!(
        "registry_persist_flush_duration_seconds",
        Unit::Seconds,
        "Duration of a persistence flush batch."
    );
    describe_histogram!(
        "registry_persist_batch_size",
        "Number of deduplicated operations in a persistence flush."
    );
    describe_counter!(
        "registry_persist_errors_total",
        Unit::Count,
        "Total failed persistence flush operations, labeled by table."
    );
    describe_counter!(
        "registry_persist_lag_events_total",
        Unit::Count,
        "Total event-stream lag events observed by the persister."
    );
}

// --- Helper functions to update metrics ---

pub fn increment_record_write(kind: &'static str, path: &'static str) {
    counter!("registry_record_writes_total", 1, "kind" => kind, "path" => path);
}

pub fn increment_write_rejected(reason: &'static str) {
    counter!("registry_writes_rejected_total", 1, "reason" => reason);
}

pub fn increment_writer_grant(role: &'static str) {
    counter!("registry_writer_grants_total", 1, "role" => role);
}

pub fn increment_writer_revocation(role: &'static str) {
    counter!("registry_writer_revocations_total", 1, "role" => role);
}

pub fn set_token_record_count(count: f64) {
    gauge!("registry_token_records", count);
}

pub fn set_protocol_record_count(count: f64) {
    gauge!("registry_protocol_records", count);
}

pub fn increment_events_published() {
    counter!("registry_events_published_total", 1);
}

pub fn set_event_subscribers(count: f64) {
    gauge!("registry_event_subscribers", count);
}

pub fn increment_rows_persisted(table: &'static str, count: u64) {
    counter!("registry_rows_persisted_total", count, "table" => table);
}

pub fn record_persist_flush_duration(duration: std::time::Duration) {
    histogram!(
        "registry_persist_flush_duration_seconds",
        duration.as_secs_f64()
    );
}

pub fn record_persist_batch_size(size: usize) {
    histogram!("registry_persist_batch_size", size as f64);
}

pub fn increment_persist_error(table: &'static str) {
    counter!("registry_persist_errors_total", 1, "table" => table);
}

pub fn increment_persist_lag_events(skipped: u64) {
    counter!("registry_persist_lag_events_total", skipped);
}

// --- Gauges & heartbeat ---

pub fn record_heartbeat() {
    gauge!("registry_up", 1.0);
    let ts = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64();
    gauge!("registry_heartbeat_unix_seconds", ts);
}
