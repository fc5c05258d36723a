//! Telemetry utilities for request timing and correlation.

use std::time::Instant;

/// Guard for timing a request and recording metrics.
///
/// Records latency and status when dropped. A request dropped before a
/// status was set (cancelled or panicked) is recorded as 500.
pub struct RequestTimer {
    route: String,
    status: Option<u16>,
    start: Instant,
}

impl RequestTimer {
    /// Start timing a request for a route pattern.
    pub fn new(route: impl Into<String>) -> Self {
        crate::metrics::adjust_in_flight(1);
        Self {
            route: route.into(),
            status: None,
            start: Instant::now(),
        }
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = Some(status);
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::adjust_in_flight(-1);
        crate::metrics::record_request(&self.route, self.status.unwrap_or(500), duration);
    }
}

/// Fresh id used to correlate log lines of one request.
pub fn request_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, info_span};

    /// Create a span for an HTTP request.
    pub fn request(method: &str, route: &str, request_id: &str) -> Span {
        info_span!("request", method = %method, route = %route, request_id = %request_id)
    }

    /// Create a span for a retried database write.
    pub fn db_write(operation: &str) -> Span {
        info_span!("db_write", operation = %operation)
    }
}
