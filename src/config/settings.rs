//! Application settings and configuration
//!
//! Settings are resolved once at startup from environment variables (and an
//! optional `.env` file) and then shared read-only with every request.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::time::Duration;

/// Chat-completions endpoint requests are relayed to unless `UPSTREAM_URL` is set
pub const DEFAULT_UPSTREAM_URL: &str = "https://ark.cn-beijing.volces.com/api/v3/bots/chat/completions";

/// Model identifier inserted when the caller omits `model`
pub const DEFAULT_MODEL: &str = "bot-20251031115408-jz6th";

/// Environment variable holding the upstream bearer credential
pub const API_KEY_ENV: &str = "VOLCANO_API_KEY";

/// Application environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[value(alias = "dev")]
    Development,
    #[value(alias = "stage")]
    Staging,
    #[value(alias = "prod")]
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Development
    }
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" | "stage" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            _ => anyhow::bail!("Invalid environment: {}. Expected: development, staging, or production", s),
        }
    }
}

/// Console log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            _ => anyhow::bail!("Invalid log format: {}. Expected: json or pretty", s),
        }
    }
}

/// Cross-origin policy configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
    /// Permitted caller origins. Empty means any origin (wildcard CORS).
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
    pub max_age_seconds: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allow_credentials: false,
            max_age_seconds: 86_400,
        }
    }
}

/// Upstream call configuration
#[derive(Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    pub url: String,

    /// Bearer credential for the upstream API
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    pub default_model: String,

    /// Hard limit for receiving the upstream response head (and error bodies)
    pub timeout_seconds: u64,

    pub connect_timeout_seconds: u64,

    /// Maximum silence between two relayed chunks; 0 disables the check
    pub stream_idle_timeout_seconds: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_UPSTREAM_URL.to_string(),
            api_key: None,
            default_model: DEFAULT_MODEL.to_string(),
            timeout_seconds: 25,
            connect_timeout_seconds: 10,
            stream_idle_timeout_seconds: 60,
        }
    }
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("default_model", &self.default_model)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("connect_timeout_seconds", &self.connect_timeout_seconds)
            .field("stream_idle_timeout_seconds", &self.stream_idle_timeout_seconds)
            .finish()
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn stream_idle_timeout(&self) -> Option<Duration> {
        (self.stream_idle_timeout_seconds > 0)
            .then(|| Duration::from_secs(self.stream_idle_timeout_seconds))
    }
}

/// Main application settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    // App settings
    pub app_name: String,
    pub app_version: String,
    pub environment: Environment,
    pub log_level: String,
    pub log_format: LogFormat,

    // Server settings
    pub host: String,
    pub port: u16,
    pub proxy_path: String,
    pub max_body_bytes: usize,

    // Request handling
    pub validate_messages: bool,
    pub expose_error_details: bool,

    pub cors: CorsConfig,
    pub upstream: UpstreamConfig,
}

impl Settings {
    /// Load settings from environment variables with defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignored in production typically)
        dotenvy::dotenv().ok();

        let settings = Self::from_lookup(|key| env::var(key).ok())?;
        settings.validate()?;

        Ok(settings)
    }

    /// Build settings from an arbitrary key lookup
    ///
    /// `load` passes the process environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let environment: Environment = get("ENVIRONMENT", "development")
            .parse()
            .unwrap_or_default();

        let origins = lookup("ALLOWED_ORIGINS")
            .or_else(|| lookup("FRONTEND_DOMAIN"))
            .unwrap_or_default();

        Ok(Self {
            app_name: get("APP_NAME", "chat-relay-proxy"),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            environment,
            log_level: get("LOG_LEVEL", "info"),
            log_format: get("LOG_FORMAT", "json")
                .parse()
                .unwrap_or(LogFormat::Json),

            host: get("HOST", "0.0.0.0"),
            port: get("PORT", "8000").parse().context("Invalid PORT value")?,
            proxy_path: get("PROXY_PATH", "/api/chat"),
            max_body_bytes: get("MAX_BODY_BYTES", "1048576")
                .parse()
                .context("Invalid MAX_BODY_BYTES value")?,

            validate_messages: get("VALIDATE_MESSAGES", "true").parse().unwrap_or(true),
            expose_error_details: lookup("EXPOSE_ERROR_DETAILS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(environment != Environment::Production),

            cors: CorsConfig {
                allowed_origins: parse_origins(&origins),
                allow_credentials: get("CORS_ALLOW_CREDENTIALS", "false")
                    .parse()
                    .unwrap_or(false),
                max_age_seconds: get("CORS_MAX_AGE_SECONDS", "86400")
                    .parse()
                    .unwrap_or(86_400),
            },

            upstream: UpstreamConfig {
                url: get("UPSTREAM_URL", DEFAULT_UPSTREAM_URL),
                api_key: lookup(API_KEY_ENV).filter(|key| !key.trim().is_empty()),
                default_model: get("DEFAULT_MODEL", DEFAULT_MODEL),
                timeout_seconds: get("UPSTREAM_TIMEOUT_SECONDS", "25")
                    .parse()
                    .context("Invalid UPSTREAM_TIMEOUT_SECONDS value")?,
                connect_timeout_seconds: get("CONNECT_TIMEOUT_SECONDS", "10")
                    .parse()
                    .unwrap_or(10),
                stream_idle_timeout_seconds: get("STREAM_IDLE_TIMEOUT_SECONDS", "60")
                    .parse()
                    .unwrap_or(60),
            },
        })
    }

    /// Validate settings
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("Port cannot be 0");
        }

        if !self.proxy_path.starts_with('/') {
            anyhow::bail!("PROXY_PATH must start with '/': {}", self.proxy_path);
        }

        if matches!(self.proxy_path.as_str(), "/health" | "/liveness") {
            anyhow::bail!("PROXY_PATH {} collides with a built-in route", self.proxy_path);
        }

        if !(self.upstream.url.starts_with("https://") || self.upstream.url.starts_with("http://")) {
            anyhow::bail!("UPSTREAM_URL must be an http(s) URL: {}", self.upstream.url);
        }

        if self.upstream.timeout_seconds == 0 {
            anyhow::bail!("UPSTREAM_TIMEOUT_SECONDS must be > 0");
        }

        if self.max_body_bytes == 0 {
            anyhow::bail!("MAX_BODY_BYTES must be > 0");
        }

        // Missing credential is not fatal: requests answer 500 until it is set
        if self.upstream.api_key.is_none() {
            tracing::warn!(
                variable = API_KEY_ENV,
                "Upstream API key is not configured; chat requests will fail"
            );
        }

        if self.is_production() && self.cors.allowed_origins.is_empty() {
            tracing::warn!("Running in production with wildcard CORS");
        }

        Ok(())
    }

    /// Check if running in production mode
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Get the server address string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "chat-relay-proxy".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: Environment::Development,
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            host: "0.0.0.0".to_string(),
            port: 8000,
            proxy_path: "/api/chat".to_string(),
            max_body_bytes: 1024 * 1024,
            validate_messages: true,
            expose_error_details: true,
            cors: CorsConfig::default(),
            upstream: UpstreamConfig::default(),
        }
    }
}

/// Split a comma-separated origin list, dropping blanks and trailing slashes
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|origin| origin.trim().trim_end_matches('/'))
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.app_name, "chat-relay-proxy");
        assert_eq!(settings.port, 8000);
        assert_eq!(settings.upstream.timeout_seconds, 25);
        assert_eq!(settings.cors.max_age_seconds, 86_400);
        assert!(settings.upstream.api_key.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!("stage".parse::<Environment>().unwrap(), Environment::Staging);
        assert_eq!("production".parse::<Environment>().unwrap(), Environment::Production);
        assert!("qa".parse::<Environment>().is_err());
    }

    #[test]
    fn test_from_lookup_reads_credential_and_origins() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("VOLCANO_API_KEY", "secret"),
            ("ALLOWED_ORIGINS", "https://a.example.com/, https://b.example.com,,"),
            ("PORT", "9000"),
        ]))
        .unwrap();

        assert_eq!(settings.upstream.api_key.as_deref(), Some("secret"));
        assert_eq!(
            settings.cors.allowed_origins,
            vec!["https://a.example.com", "https://b.example.com"]
        );
        assert_eq!(settings.port, 9000);
    }

    #[test]
    fn test_frontend_domain_alias() {
        let settings = Settings::from_lookup(lookup_from(&[(
            "FRONTEND_DOMAIN",
            "https://lse.eu.qualtrics.com",
        )]))
        .unwrap();
        assert_eq!(settings.cors.allowed_origins, vec!["https://lse.eu.qualtrics.com"]);
    }

    #[test]
    fn test_blank_credential_is_treated_as_missing() {
        let settings = Settings::from_lookup(lookup_from(&[("VOLCANO_API_KEY", "  ")])).unwrap();
        assert!(settings.upstream.api_key.is_none());
    }

    #[test]
    fn test_error_details_hidden_in_production_by_default() {
        let prod = Settings::from_lookup(lookup_from(&[("ENVIRONMENT", "prod")])).unwrap();
        assert!(prod.is_production());
        assert!(!prod.expose_error_details);

        let forced = Settings::from_lookup(lookup_from(&[
            ("ENVIRONMENT", "prod"),
            ("EXPOSE_ERROR_DETAILS", "true"),
        ]))
        .unwrap();
        assert!(forced.expose_error_details);
    }

    #[test]
    fn test_invalid_port_is_an_error() {
        assert!(Settings::from_lookup(lookup_from(&[("PORT", "http")])).is_err());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.proxy_path = "api/chat".to_string();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.proxy_path = "/health".to_string();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.upstream.url = "ftp://example.com".to_string();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.upstream.timeout_seconds = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_idle_timeout_disabled_by_zero() {
        let mut upstream = UpstreamConfig::default();
        assert_eq!(upstream.stream_idle_timeout(), Some(Duration::from_secs(60)));
        upstream.stream_idle_timeout_seconds = 0;
        assert_eq!(upstream.stream_idle_timeout(), None);
    }

    #[test]
    fn test_server_addr() {
        let settings = Settings::default();
        assert_eq!(settings.server_addr(), "0.0.0.0:8000");
    }

    #[test]
    fn test_api_key_is_not_serialized() {
        let mut settings = Settings::default();
        settings.upstream.api_key = Some("secret-value".to_string());
        let json = serde_json::to_string(&settings).unwrap();
        assert!(!json.contains("secret-value"));
    }

    #[test]
    fn test_api_key_is_redacted_in_debug() {
        let mut settings = Settings::default();
        settings.upstream.api_key = Some("secret-value".to_string());

        let debug = format!("{:?}", settings);
        assert!(!debug.contains("secret-value"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains(&settings.upstream.url));
    }
}
