//! Configuration management module
//!
//! This module handles loading and validating application configuration
//! from environment variables and .env files.

pub mod settings;

pub use settings::{
    CorsConfig, Environment, LogFormat, Settings, UpstreamConfig, API_KEY_ENV, DEFAULT_MODEL,
    DEFAULT_UPSTREAM_URL,
};
