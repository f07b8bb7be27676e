//! Stream optimizer metrics.
//!
//! Recorded through the `metrics` facade; without an installed recorder the
//! calls are no-ops.

use metrics::{counter, gauge};

/// Metric names as constants for consistency.
pub mod names {
    pub const HANDLES_ACTIVE: &str = "wxloop_media_handles_active";
    pub const MEMORY_BYTES: &str = "wxloop_media_memory_bytes";
    pub const OPTIMIZED_TOTAL: &str = "wxloop_media_optimized_total";
    pub const BUFFER_EVENTS_TOTAL: &str = "wxloop_media_buffer_events_total";
    pub const RECLAIMED_TOTAL: &str = "wxloop_media_reclaimed_total";
    pub const PRELOAD_SKIPPED_TOTAL: &str = "wxloop_media_preload_skipped_total";
}

pub fn record_optimized(priority: &str, preload: &str) {
    let labels = [
        ("priority", priority.to_string()),
        ("preload", preload.to_string()),
    ];
    counter!(names::OPTIMIZED_TOTAL, &labels).increment(1);
}

/// `kind` is `stall` or `resume`.
pub fn record_buffer_event(kind: &'static str) {
    counter!(names::BUFFER_EVENTS_TOTAL, "kind" => kind).increment(1);
}

/// `reason` is `sweep`, `liveness` or `explicit`.
pub fn record_reclaimed(reason: &'static str) {
    counter!(names::RECLAIMED_TOTAL, "reason" => reason).increment(1);
}

pub fn record_preload_skipped() {
    counter!(names::PRELOAD_SKIPPED_TOTAL).increment(1);
}

pub fn set_pool_gauges(active_handles: usize, memory_bytes: u64) {
    gauge!(names::HANDLES_ACTIVE).set(active_handles as f64);
    gauge!(names::MEMORY_BYTES).set(memory_bytes as f64);
}
