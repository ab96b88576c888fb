//! Upstream chat-completions client
//!
//! The proxy talks to exactly one fixed endpoint. `ChatUpstream` is the seam
//! between request handling and the network so handlers can be exercised
//! against an in-process stub.

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::StatusCode;
use futures::stream::{Stream, StreamExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;
use std::pin::Pin;
use thiserror::Error;

use crate::config::UpstreamConfig;

/// Ordered body chunks exactly as the upstream produced them
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, UpstreamError>> + Send>>;

/// Errors raised while talking to the upstream API
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Stream error: {0}")]
    Stream(String),
}

/// Largest upstream error body kept for the client and the logs
pub const MAX_ERROR_BODY_BYTES: usize = 64 * 1024;

/// Appended when an error body was cut at `MAX_ERROR_BODY_BYTES`
pub const TRUNCATED_MARKER: &str = " [truncated]";

/// Status plus a not-yet-consumed body
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub body: ByteStream,
}

impl UpstreamResponse {
    pub fn new(status: StatusCode, body: ByteStream) -> Self {
        Self { status, body }
    }

    /// Read the body as text, at most `MAX_ERROR_BODY_BYTES` of it.
    ///
    /// Vendor error bodies are not guaranteed to be JSON. Reading stops at
    /// the cap and the rest of the body is dropped unread.
    pub async fn text(mut self) -> Result<String, UpstreamError> {
        let mut buf = Vec::new();
        let mut truncated = false;
        while let Some(chunk) = self.body.next().await {
            let chunk = chunk?;
            let room = MAX_ERROR_BODY_BYTES - buf.len();
            if chunk.len() > room {
                buf.extend_from_slice(&chunk[..room]);
                truncated = true;
                break;
            }
            buf.extend_from_slice(&chunk);
        }

        let mut text = String::from_utf8_lossy(&buf).into_owned();
        if truncated {
            text.push_str(TRUNCATED_MARKER);
        }
        Ok(text)
    }
}

impl std::fmt::Debug for UpstreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Single-shot chat-completion call; implementations must not retry
#[async_trait]
pub trait ChatUpstream: Send + Sync {
    async fn send(&self, api_key: &str, payload: &Value) -> Result<UpstreamResponse, UpstreamError>;
}

/// `ChatUpstream` backed by a shared reqwest client
#[derive(Clone)]
pub struct HttpUpstream {
    client: Client,
    url: String,
}

impl HttpUpstream {
    /// Build the client once; it pools connections across requests
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UpstreamError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChatUpstream for HttpUpstream {
    async fn send(&self, api_key: &str, payload: &Value) -> Result<UpstreamResponse, UpstreamError> {
        tracing::debug!(url = %self.url, "Sending request upstream");

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream")
            .bearer_auth(api_key)
            .json(payload)
            .send()
            .await?;

        // reqwest 0.11 is on http 0.2, axum on http 1.x
        let status = StatusCode::from_u16(response.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(UpstreamError::from));

        Ok(UpstreamResponse::new(status, Box::pin(body)))
    }
}
