//! Streaming chat-completion relay
//!
//! Forwards chat-completion requests from browser clients to a single
//! upstream API with a server-side credential, streams the SSE answer back
//! unchanged, and attaches CORS headers to every response.

pub mod api;
pub mod config;
pub mod error;
pub mod middleware;
pub mod schemas;
pub mod server;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use error::ProxyError;
pub use server::{create_router, App, AppState};
