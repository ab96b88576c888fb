use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of the `GET` health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub service: String,
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub environment: String,
    pub uptime_seconds: u64,
}

/// Response for liveness probe
#[derive(Debug, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub alive: bool,
}
