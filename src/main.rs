//! Chat Relay Proxy
//!
//! Relays chat-completion requests from a browser survey tool to the
//! upstream LLM API and streams the answer back.

use anyhow::Result;
use chat_relay_proxy::{
    config::{Environment, LogFormat, Settings},
    server::App,
};
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Chat Relay Proxy
///
/// Streaming chat-completion relay with CORS.
#[derive(Parser, Debug)]
#[command(name = "chat-relay-proxy")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on (overrides PORT env var)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to (overrides HOST env var)
    #[arg(long)]
    host: Option<String>,

    /// Log level: trace, debug, info, warn, error (overrides LOG_LEVEL env var)
    #[arg(long)]
    log_level: Option<String>,

    /// Console log format (overrides LOG_FORMAT env var)
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Environment: dev, staging, prod (overrides ENVIRONMENT env var)
    #[arg(short, long)]
    env: Option<Environment>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration first (before logging, so we can use log_level)
    let mut settings = Settings::load()?;

    if let Some(port) = args.port {
        settings.port = port;
    }
    if let Some(host) = args.host {
        settings.host = host;
    }
    if let Some(log_level) = args.log_level {
        settings.log_level = log_level;
    }
    if let Some(log_format) = args.log_format {
        settings.log_format = log_format;
    }
    if let Some(env) = args.env {
        settings.environment = env;
    }

    init_tracing(&settings.log_level, settings.log_format);

    // Re-run validation so the warnings are logged now that tracing is up
    settings.validate()?;

    tracing::info!(
        app_name = %settings.app_name,
        version = %settings.app_version,
        environment = %settings.environment,
        host = %settings.host,
        port = %settings.port,
        "Starting application"
    );

    let app = App::new(settings)?;
    app.run_with_graceful_shutdown().await?;

    tracing::info!("Application shutdown complete");

    Ok(())
}

/// Initialize tracing subscriber with the specified log level
fn init_tracing(log_level: &str, format: LogFormat) {
    // Build filter from RUST_LOG env var or use provided log level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }
}
