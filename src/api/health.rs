//! Health check endpoints
//!
//! `GET` on the proxy path and `GET /health` report the service as running
//! without authentication or any upstream call.

use axum::{extract::State, Json};
use chrono::Utc;

use crate::schemas::{HealthResponse, LivenessResponse};
use crate::server::state::AppState;

/// Main health check endpoint
///
/// GET /health (and GET on the proxy path)
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        service: state.settings.app_name.clone(),
        status: "running".to_string(),
        timestamp: Utc::now(),
        version: state.settings.app_version.clone(),
        environment: state.settings.environment.to_string(),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// Liveness probe endpoint
///
/// GET /liveness
pub async fn liveness() -> Json<LivenessResponse> {
    // Simple liveness check - if we can respond, we're alive
    Json(LivenessResponse { alive: true })
}
