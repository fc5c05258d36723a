//! Prometheus metrics collection for customforms.
//!
//! Exposed on `/metrics` when `server.metrics` is enabled.
//!
//! - `http_requests_total{route,status}` - Requests served by route
//! - `http_request_duration_seconds{route}` - Request latency histogram
//! - `http_errors_total{route,error}` - Failed requests by error code
//! - `forms_*_total` - Domain events (templates saved, submissions, likes, comments)
//! - `db_busy_retries_total{operation}` - Writes retried on SQLite busy/locked

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// HTTP
// ========================================================================

/// Requests served by route pattern and status code.
pub static HTTP_REQUESTS: OnceLock<IntCounterVec> = OnceLock::new();

/// Request latency by route pattern.
pub static HTTP_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Failed requests by route and error code.
pub static HTTP_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

/// Requests currently being handled.
pub static HTTP_IN_FLIGHT: OnceLock<IntGauge> = OnceLock::new();

// ========================================================================
// Domain events
// ========================================================================

/// Templates created or updated, by action.
pub static TEMPLATES_SAVED: OnceLock<IntCounterVec> = OnceLock::new();

/// Responses stored.
pub static RESPONSES_SUBMITTED: OnceLock<IntCounter> = OnceLock::new();

/// Re-submissions answered with an existing response.
pub static DUPLICATE_SUBMISSIONS: OnceLock<IntCounter> = OnceLock::new();

/// Like toggles, by resulting state.
pub static LIKES_TOGGLED: OnceLock<IntCounterVec> = OnceLock::new();

/// Comments posted.
pub static COMMENTS_POSTED: OnceLock<IntCounter> = OnceLock::new();

/// Users synced from the identity provider.
pub static USERS_SYNCED: OnceLock<IntCounter> = OnceLock::new();

/// Writes retried because SQLite reported busy/locked.
pub static DB_RETRIES: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before any metrics are recorded.
pub fn init() {
    let r = registry();

    // Helper macro to register metric
    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(
                    error = %e,
                    concat!("Failed to register metric ", stringify!($metric))
                );
            }
            let _ = $metric.set(m);
        };
    }

    register!(
        HTTP_REQUESTS,
        IntCounterVec::new(
            Opts::new("http_requests_total", "HTTP requests by route and status"),
            &["route", "status"]
        )
    );
    register!(
        HTTP_LATENCY,
        HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "HTTP request latency by route")
                .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
            &["route"]
        )
    );
    register!(
        HTTP_ERRORS,
        IntCounterVec::new(
            Opts::new("http_errors_total", "HTTP errors by route and error code"),
            &["route", "error"]
        )
    );
    register!(
        HTTP_IN_FLIGHT,
        IntGauge::new(
            "http_requests_in_flight",
            "HTTP requests currently being handled"
        )
    );

    register!(
        TEMPLATES_SAVED,
        IntCounterVec::new(
            Opts::new("forms_templates_saved_total", "Templates created or updated"),
            &["action"]
        )
    );
    register!(
        RESPONSES_SUBMITTED,
        IntCounter::new(
            "forms_responses_submitted_total",
            "Form responses stored"
        )
    );
    register!(
        DUPLICATE_SUBMISSIONS,
        IntCounter::new(
            "forms_duplicate_submissions_total",
            "Re-submissions answered with an existing response"
        )
    );
    register!(
        LIKES_TOGGLED,
        IntCounterVec::new(
            Opts::new("forms_likes_toggled_total", "Like toggles by resulting state"),
            &["state"]
        )
    );
    register!(COMMENTS_POSTED, IntCounter::new("forms_comments_posted_total", "Comments posted"));
    register!(
        USERS_SYNCED,
        IntCounter::new(
            "forms_users_synced_total",
            "Users synced from the identity provider"
        )
    );
    register!(
        DB_RETRIES,
        IntCounterVec::new(
            Opts::new("db_busy_retries_total", "Writes retried on SQLite busy/locked"),
            &["operation"]
        )
    );
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions for metric updates
// ============================================================================

fn get_counter_vec(metric: &OnceLock<IntCounterVec>) -> Option<&IntCounterVec> {
    metric.get()
}

fn get_counter(metric: &OnceLock<IntCounter>) -> Option<&IntCounter> {
    metric.get()
}

fn get_histogram_vec(metric: &OnceLock<HistogramVec>) -> Option<&HistogramVec> {
    metric.get()
}

/// Record a finished request with latency.
#[inline]
pub fn record_request(route: &str, status: u16, duration_secs: f64) {
    if let Some(c) = get_counter_vec(&HTTP_REQUESTS) {
        c.with_label_values(&[route, &status.to_string()]).inc();
    }
    if let Some(h) = get_histogram_vec(&HTTP_LATENCY) {
        h.with_label_values(&[route]).observe(duration_secs);
    }
}

/// Record a request error.
#[inline]
pub fn record_error(route: &str, error: &str) {
    if let Some(c) = get_counter_vec(&HTTP_ERRORS) {
        c.with_label_values(&[route, error]).inc();
    }
}

/// Adjust the in-flight request gauge.
#[inline]
pub fn adjust_in_flight(delta: i64) {
    if let Some(g) = HTTP_IN_FLIGHT.get() {
        g.add(delta);
    }
}

#[inline]
pub fn record_template_saved(created: bool) {
    if let Some(c) = get_counter_vec(&TEMPLATES_SAVED) {
        c.with_label_values(&[if created { "create" } else { "update" }]).inc();
    }
}

#[inline]
pub fn record_submission(duplicate: bool) {
    let metric = if duplicate {
        &DUPLICATE_SUBMISSIONS
    } else {
        &RESPONSES_SUBMITTED
    };
    if let Some(c) = get_counter(metric) {
        c.inc();
    }
}

#[inline]
pub fn record_like(liked: bool) {
    if let Some(c) = get_counter_vec(&LIKES_TOGGLED) {
        c.with_label_values(&[if liked { "liked" } else { "unliked" }]).inc();
    }
}

#[inline]
pub fn record_comment() {
    if let Some(c) = get_counter(&COMMENTS_POSTED) {
        c.inc();
    }
}

#[inline]
pub fn record_user_synced() {
    if let Some(c) = get_counter(&USERS_SYNCED) {
        c.inc();
    }
}

/// Record a retry of a write that hit SQLite busy/locked.
#[inline]
pub fn record_db_retry(operation: &str) {
    if let Some(c) = get_counter_vec(&DB_RETRIES) {
        c.with_label_values(&[operation]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_lifecycle() {
        init();

        record_request("/api/templates/{id}", 200, 0.002);
        record_error("/api/templates/{id}", "not_found");
        record_submission(true);
        record_db_retry("submit_response");

        let output = gather_metrics();
        assert!(output.contains("http_requests_total"));
        assert!(output.contains("forms_duplicate_submissions_total"));
        assert!(output.contains("db_busy_retries_total"));
    }
}
