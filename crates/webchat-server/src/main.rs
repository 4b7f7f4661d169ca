//! # webchat
//!
//! Realtime chat server: every message is fanned out to all connected
//! clients, and newcomers get the last few chat lines.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! webchat
//!
//! # Run with a custom config
//! WEBCHAT_CONFIG=/path/to/webchat.toml webchat
//!
//! # Run with environment variables
//! WEBCHAT_PORT=8080 WEBCHAT_HOST=0.0.0.0 webchat
//! ```

mod config;
mod handlers;
mod metrics;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "webchat=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!("Starting webchat server on {}:{}", config.host, config.port);

    // Initialize metrics
    metrics::init_metrics();

    // Start the server
    handlers::run_server(config).await?;

    Ok(())
}
