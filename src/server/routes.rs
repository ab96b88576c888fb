//! Application routing
//!
//! This module defines all HTTP routes for the application.

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::any::Any;
use tower_http::catch_panic::CatchPanicLayer;

use crate::api::{chat, health};
use crate::error::ErrorBody;
use crate::middleware::{apply_cors, log_request};
use crate::server::state::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let proxy_path = state.settings.proxy_path.clone();
    let body_limit = state.settings.max_body_bytes;
    let cors = state.cors.clone();

    // POST relays, GET reports health, OPTIONS answers preflight
    let proxy_routes = post(chat::relay_chat)
        .get(health::health_check)
        .options(chat::preflight)
        .fallback(chat::method_not_allowed);

    Router::new()
        .route(&proxy_path, proxy_routes)
        .route("/health", get(health::health_check))
        .route("/liveness", get(health::liveness))
        .fallback(chat::not_found)
        // Layer order: last added = outermost = runs first
        // Enforced by the body extractor so the 413 goes through ProxyError
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::custom(panic_response))
        // CORS sits outside everything that can produce a response
        .layer(middleware::from_fn_with_state(cors, apply_cors))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

/// Turn a handler panic into the same JSON shape as other internal failures
fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic"
    };
    tracing::error!(panic = %message, "Request handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody::new("Proxy server error")),
    )
        .into_response()
}
