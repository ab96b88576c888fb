//! Cross-origin resource sharing
//!
//! One policy decides the CORS headers of every response the service
//! produces: relayed streams, JSON errors, preflights and health checks.
//! The decision is also stored in the request extensions so the chat
//! handler can refuse origins that are not on the allow-list. An origin
//! outside the allow-list only sees its origin echoed on error responses,
//! so it can read the rejection but never passes a preflight.

use axum::{
    extract::{Request, State},
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
            ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
            ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE, ORIGIN, VARY,
        },
        HeaderMap, HeaderValue, StatusCode,
    },
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::config::CorsConfig;

pub const ALLOWED_METHODS: &str = "POST, GET, OPTIONS";
pub const ALLOWED_HEADERS: &str = "Content-Type, Authorization";

/// Origin allow-list plus the static parts of the CORS answer
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allowed_origins: Arc<[String]>,
    allow_credentials: bool,
    max_age_seconds: u64,
}

/// Outcome of checking one request's `Origin`
#[derive(Debug, Clone)]
pub struct CorsDecision {
    pub origin: Option<String>,
    /// Whether the caller may use the proxy
    pub permitted: bool,
    pub headers: HeaderMap,
}

impl CorsPolicy {
    pub fn new(config: &CorsConfig) -> Self {
        Self {
            allowed_origins: config.allowed_origins.clone().into(),
            allow_credentials: config.allow_credentials,
            max_age_seconds: config.max_age_seconds,
        }
    }

    /// No allow-list configured (or an explicit `*` entry)
    pub fn is_wildcard(&self) -> bool {
        self.allowed_origins.is_empty() || self.allowed_origins.iter().any(|o| o == "*")
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        let origin = origin.trim_end_matches('/');
        self.allowed_origins
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(origin))
    }

    /// Resolve the CORS headers for a request origin
    ///
    /// Rejected origins still get their origin echoed back; `headers_for`
    /// keeps that echo on error responses only.
    pub fn resolve(&self, origin: Option<&str>) -> CorsDecision {
        let permitted = self.is_wildcard() || origin.map_or(false, |o| self.is_allowed(o));

        let echo = origin.and_then(|o| HeaderValue::from_str(o).ok());
        let allow_origin = match echo {
            Some(value) if !self.is_wildcard() || self.allow_credentials => Some(value),
            _ if self.is_wildcard() => Some(HeaderValue::from_static("*")),
            // No origin to echo: name the primary allowed origin
            _ => self
                .allowed_origins
                .first()
                .and_then(|o| HeaderValue::from_str(o).ok()),
        };

        let mut headers = HeaderMap::new();
        if let Some(value) = allow_origin {
            if value != "*" {
                headers.insert(VARY, HeaderValue::from_static("Origin"));
            }
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }
        if self.allow_credentials {
            headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        }
        headers.insert(
            ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static(EXPOSED_HEADERS),
        );

        CorsDecision {
            origin: origin.map(str::to_string),
            permitted,
            headers,
        }
    }

    /// Extra headers a preflight answer carries on top of `resolve`
    pub fn preflight_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        );
        headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from(self.max_age_seconds));
        headers
    }
}

impl CorsDecision {
    /// Headers to attach to a response with the given status
    pub fn headers_for(&self, status: StatusCode) -> HeaderMap {
        let mut headers = self.headers.clone();
        if !self.permitted && !(status.is_client_error() || status.is_server_error()) {
            headers.remove(ACCESS_CONTROL_ALLOW_ORIGIN);
            headers.remove(ACCESS_CONTROL_ALLOW_CREDENTIALS);
            headers.remove(VARY);
        }
        headers
    }
}

const EXPOSED_HEADERS: &str = "x-trace-id, x-request-id";

/// Middleware attaching the resolved CORS headers to every response
pub async fn apply_cors(State(policy): State<CorsPolicy>, mut request: Request, next: Next) -> Response {
    let origin = request
        .headers()
        .get(ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let decision = policy.resolve(origin.as_deref());
    request.extensions_mut().insert(decision.clone());

    let mut response = next.run(request).await;
    let headers = decision.headers_for(response.status());
    for (name, value) in headers.iter() {
        response.headers_mut().insert(name.clone(), value.clone());
    }
    response
}
