//! Request logging middleware
//!
//! Every request gets a trace ID (taken from the caller or generated), a
//! span, and one completion line with status and duration. For relayed
//! streams the duration covers the time to the response head only; the
//! relay logs its own totals when the stream ends.

use axum::{
    extract::Request,
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// Header name for trace ID
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Header name for request ID (alias for trace ID)
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Extension type for storing trace ID in request extensions
#[derive(Clone, Debug)]
pub struct TraceId(pub String);

impl TraceId {
    /// Generate a new trace ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Caller-supplied `x-trace-id`, then `x-request-id`, else a fresh UUID
    fn from_request(request: &Request) -> Self {
        [TRACE_ID_HEADER, REQUEST_ID_HEADER]
            .iter()
            .find_map(|name| {
                request
                    .headers()
                    .get(*name)
                    .and_then(|v| v.to_str().ok())
                    .filter(|v| !v.is_empty())
            })
            .map(|id| TraceId(id.to_string()))
            .unwrap_or_default()
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Middleware to log HTTP requests and responses
pub async fn log_request(mut request: Request, next: Next) -> Response {
    let start = Instant::now();
    let trace_id = TraceId::from_request(&request);

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    tracing::info!(
        trace_id = %trace_id,
        method = %method,
        path = %path,
        origin = %origin,
        "Incoming request"
    );

    request.extensions_mut().insert(trace_id.clone());

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %method,
        path = %path,
    );
    let mut response = next.run(request).instrument(span).await;

    let status = response.status();
    let duration_ms = format!("{:.2}", start.elapsed().as_secs_f64() * 1000.0);

    if status.is_server_error() {
        tracing::error!(trace_id = %trace_id, status = status.as_u16(), duration_ms = %duration_ms, "Server error");
    } else if status.is_client_error() {
        tracing::warn!(trace_id = %trace_id, status = status.as_u16(), duration_ms = %duration_ms, "Client error");
    } else {
        tracing::info!(trace_id = %trace_id, status = status.as_u16(), duration_ms = %duration_ms, "Request completed");
    }

    if let Ok(value) = HeaderValue::from_str(trace_id.as_str()) {
        response.headers_mut().insert(TRACE_ID_HEADER, value.clone());
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}
