//! Engine metrics.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // Selection
    pub const DRAWS_TOTAL: &str = "wxloop_draws_total";
    pub const REPEAT_EXCLUSIONS_TOTAL: &str = "wxloop_repeat_exclusions_total";
    pub const CATALOG_FALLBACKS_TOTAL: &str = "wxloop_catalog_fallbacks_total";

    // Trigger gate
    pub const TRIGGER_CHECKS_TOTAL: &str = "wxloop_trigger_checks_total";
    pub const TRIGGERS_RECORDED_TOTAL: &str = "wxloop_triggers_recorded_total";
    pub const STORAGE_FAILURES_TOTAL: &str = "wxloop_storage_failures_total";

    // Playback
    pub const PLAYBACKS_TOTAL: &str = "wxloop_playbacks_total";
    pub const PLAYBACK_DURATION_SECONDS: &str = "wxloop_playback_duration_seconds";
    pub const BUSY_REJECTIONS_TOTAL: &str = "wxloop_busy_rejections_total";
}

pub fn record_draw(weather: &str, tier: &str) {
    let labels = [("weather", weather.to_string()), ("tier", tier.to_string())];
    counter!(names::DRAWS_TOTAL, &labels).increment(1);
}

pub fn record_repeat_exclusion(weather: &str) {
    counter!(names::REPEAT_EXCLUSIONS_TOTAL, "weather" => weather.to_string()).increment(1);
}

pub fn record_catalog_fallback(weather: &str) {
    counter!(names::CATALOG_FALLBACKS_TOTAL, "weather" => weather.to_string()).increment(1);
}

/// `result` is `eligible` or `denied`.
pub fn record_trigger_check(result: &'static str) {
    counter!(names::TRIGGER_CHECKS_TOTAL, "result" => result).increment(1);
}

pub fn record_trigger(trigger_type: &str) {
    counter!(names::TRIGGERS_RECORDED_TOTAL, "type" => trigger_type.to_string()).increment(1);
}

/// `operation` is `read` or `write`.
pub fn record_storage_failure(operation: &'static str) {
    counter!(names::STORAGE_FAILURES_TOTAL, "operation" => operation).increment(1);
}

/// `result` is `played`, `skipped`, `cancelled` or an error kind.
pub fn record_playback(result: &str, duration_secs: f64) {
    counter!(names::PLAYBACKS_TOTAL, "result" => result.to_string()).increment(1);
    histogram!(names::PLAYBACK_DURATION_SECONDS).record(duration_secs);
}

pub fn record_busy_rejection() {
    counter!(names::BUSY_REJECTIONS_TOTAL).increment(1);
}
