//! Per-request span, timing and error accounting.

use crate::error::ErrorCode;
use crate::telemetry::{self, RequestTimer, spans};
use axum::extract::{MatchedPath, Request};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;

pub async fn track(matched: Option<MatchedPath>, request: Request, next: Next) -> Response {
    let route = matched
        .map(|m| m.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let request_id = telemetry::request_id();
    let span = spans::request(request.method().as_str(), &route, &request_id);

    let mut timer = RequestTimer::new(route.clone());
    let mut response = next.run(request).instrument(span).await;
    timer.set_status(response.status().as_u16());

    if let Some(code) = response.extensions().get::<ErrorCode>() {
        crate::metrics::record_error(&route, code.0);
    }
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}
