//! Application state container
//!
//! This module defines the shared application state that is passed
//! to all request handlers via Axum's state extraction. Nothing in it is
//! mutated after startup.

use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::middleware::CorsPolicy;
use crate::services::{ChatUpstream, HttpUpstream};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Client for the upstream chat-completions endpoint
    pub upstream: Arc<dyn ChatUpstream>,

    /// Origin policy applied to every response
    pub cors: CorsPolicy,

    /// Application start time (for uptime calculation)
    pub start_time: Instant,
}

impl AppState {
    /// Create state with the reqwest-backed upstream client
    pub fn new(settings: Settings) -> anyhow::Result<Self> {
        tracing::debug!(url = %settings.upstream.url, "Creating upstream HTTP client");
        let upstream = HttpUpstream::new(&settings.upstream)?;

        Ok(Self::with_upstream(settings, Arc::new(upstream)))
    }

    /// Create state around any upstream implementation
    pub fn with_upstream(settings: Settings, upstream: Arc<dyn ChatUpstream>) -> Self {
        let cors = CorsPolicy::new(&settings.cors);

        tracing::info!(
            wildcard_cors = cors.is_wildcard(),
            allowed_origins = settings.cors.allowed_origins.len(),
            validate_messages = settings.validate_messages,
            "Application state initialized"
        );

        Self {
            settings: Arc::new(settings),
            upstream,
            cors,
            start_time: Instant::now(),
        }
    }

    /// Get the application uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
