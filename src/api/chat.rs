//! Chat-completion relay endpoint
//!
//! `POST` on the proxy path forwards the caller's body to the upstream API
//! with the server-side credential and streams the answer back untouched.
//! `OPTIONS` answers CORS preflights and `GET` reports health. Neither of
//! those touches the upstream.

use axum::{
    body::{Body, Bytes},
    extract::{rejection::BytesRejection, State},
    http::{
        header::{ALLOW, CACHE_CONTROL, CONNECTION, CONTENT_TYPE, ORIGIN},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
    Extension, Json,
};

use crate::error::{ErrorBody, ProxyError};
use crate::middleware::{cors::ALLOWED_METHODS, CorsDecision, TraceId};
use crate::schemas::prepare_payload;
use crate::server::state::AppState;
use crate::services::relay_stream;
use crate::utils::Deadline;

pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream; charset=utf-8";

/// Longest upstream error body echoed into the logs
const LOGGED_DETAILS_CHARS: usize = 512;

/// OPTIONS on the proxy path - CORS preflight
///
/// The allow-origin part is added by the CORS middleware.
pub async fn preflight(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::NO_CONTENT, state.cors.preflight_headers())
}

/// Any method other than POST, GET or OPTIONS
pub async fn method_not_allowed() -> impl IntoResponse {
    ([(ALLOW, ALLOWED_METHODS)], ProxyError::MethodNotAllowed)
}

/// Unknown paths
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(ErrorBody::new("Not Found")))
}

/// POST on the proxy path - relay a chat completion
pub async fn relay_chat(
    State(state): State<AppState>,
    cors: Option<Extension<CorsDecision>>,
    trace_id: Option<Extension<TraceId>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let decision = match cors {
        Some(Extension(decision)) => decision,
        None => state
            .cors
            .resolve(headers.get(ORIGIN).and_then(|v| v.to_str().ok())),
    };
    let request_id = trace_id
        .map(|Extension(id)| id.0)
        .unwrap_or_else(|| TraceId::new().0);

    match forward(&state, &decision, &request_id, body).await {
        Ok(response) => response,
        Err(err) => {
            if err.status().is_server_error() {
                tracing::error!(request_id = %request_id, error = %err, "Chat relay failed");
            } else {
                tracing::warn!(request_id = %request_id, error = %err, "Chat request rejected");
            }
            err.into_response_with(state.settings.expose_error_details)
        }
    }
}

/// Validate, call upstream once, and turn the answer into a response
async fn forward(
    state: &AppState,
    decision: &CorsDecision,
    request_id: &str,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ProxyError> {
    let settings = &state.settings;
    let origin = decision.origin.as_deref().unwrap_or("-");

    if !decision.permitted {
        tracing::warn!(request_id = %request_id, origin = %origin, "Origin not on allow-list");
        return Err(ProxyError::UnauthorizedOrigin);
    }

    // Oversized or unreadable bodies surface here, after the origin check
    let body = body?;

    let prepared = prepare_payload(
        &body,
        &settings.upstream.default_model,
        settings.validate_messages,
    )?;

    let api_key = settings
        .upstream
        .api_key
        .as_deref()
        .ok_or(ProxyError::MissingCredential)?;

    tracing::info!(
        request_id = %request_id,
        origin = %origin,
        message_count = prepared.message_count.unwrap_or(0),
        model = %prepared.payload["model"],
        stream = %prepared.payload["stream"],
        "Forwarding chat request upstream"
    );

    let deadline = Deadline::after(settings.upstream.timeout());
    let upstream = deadline
        .run(state.upstream.send(api_key, &prepared.payload))
        .await?;

    if !upstream.status.is_success() {
        let status = upstream.status;
        let details = deadline.run(upstream.text()).await?;

        tracing::warn!(
            request_id = %request_id,
            upstream_status = status.as_u16(),
            details = %details.chars().take(LOGGED_DETAILS_CHARS).collect::<String>(),
            "Upstream returned an error"
        );

        return Err(ProxyError::Upstream { status, details });
    }

    let stream = relay_stream(
        upstream.body,
        settings.upstream.stream_idle_timeout(),
        request_id.to_string(),
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, EVENT_STREAM_CONTENT_TYPE)
        .header(CACHE_CONTROL, "no-cache, no-transform")
        .header(CONNECTION, "keep-alive")
        // Disable nginx buffering
        .header("x-accel-buffering", "no")
        .body(Body::from_stream(stream))
        .map_err(|e| ProxyError::Internal(e.to_string()))
}
