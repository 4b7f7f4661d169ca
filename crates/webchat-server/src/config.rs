//! Server configuration.
//!
//! Configuration can be loaded from:
//! - A TOML file named by `WEBCHAT_CONFIG`
//! - `webchat.toml`, `/etc/webchat/webchat.toml` or `~/.config/webchat/webchat.toml`
//! - Environment variables (`WEBCHAT_HOST`, `WEBCHAT_PORT`) for the defaults

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use webchat_core::HubConfig;
use webchat_transport::PumpConfig;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path for the WebSocket endpoint.
    #[serde(default = "default_ws_path")]
    pub websocket_path: String,

    /// Prefix under which the page and WebSocket are also served.
    /// Empty disables the alias.
    #[serde(default = "default_alias")]
    pub alias: String,

    /// Home page template read on every request. The built-in page is used
    /// when unset.
    #[serde(default)]
    pub home_page: Option<PathBuf>,

    /// Hub configuration.
    #[serde(default)]
    pub hub: HubSettings,

    /// Per-connection configuration.
    #[serde(default)]
    pub connection: ConnectionSettings,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Hub configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubSettings {
    /// Chat messages replayed to new connections.
    #[serde(default = "default_history_size")]
    pub history_size: usize,

    /// Capacity of the hub's input channels.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

/// Per-connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Outbound queue capacity; a full queue disconnects the client.
    #[serde(default = "default_send_queue_capacity")]
    pub send_queue_capacity: usize,

    /// Maximum incoming message size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Keepalive ping interval in milliseconds.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_ms: u64,

    /// Disconnect after this long without any incoming frame.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_ms: u64,

    /// Timeout for a single write in milliseconds.
    #[serde(default = "default_write_timeout")]
    pub write_timeout_ms: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_host() -> String {
    std::env::var("WEBCHAT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string())
}

fn default_port() -> u16 {
    std::env::var("WEBCHAT_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080)
}

fn default_true() -> bool {
    true
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

fn default_alias() -> String {
    "/chat".to_string()
}

fn default_history_size() -> usize {
    5
}

fn default_channel_capacity() -> usize {
    64
}

fn default_send_queue_capacity() -> usize {
    256
}

fn default_max_message_size() -> usize {
    64 * 1024 // 64 KB
}

fn default_ping_interval() -> u64 {
    54_000 // 54 seconds
}

fn default_idle_timeout() -> u64 {
    60_000 // 60 seconds
}

fn default_write_timeout() -> u64 {
    10_000 // 10 seconds
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            websocket_path: default_ws_path(),
            alias: default_alias(),
            home_page: None,
            hub: HubSettings::default(),
            connection: ConnectionSettings::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            history_size: default_history_size(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            send_queue_capacity: default_send_queue_capacity(),
            max_message_size: default_max_message_size(),
            ping_interval_ms: default_ping_interval(),
            idle_timeout_ms: default_idle_timeout(),
            write_timeout_ms: default_write_timeout(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from file or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed, or if
    /// `WEBCHAT_CONFIG` names a file that cannot be read.
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var("WEBCHAT_CONFIG") {
            let expanded = shellexpand::tilde(&path);
            return Self::from_file(expanded.as_ref());
        }

        // Try to load from default paths
        let config_paths = [
            "webchat.toml",
            "/etc/webchat/webchat.toml",
            "~/.config/webchat/webchat.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        // Fall back to defaults with environment overrides
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Get the socket address to bind to.
    ///
    /// # Errors
    ///
    /// Returns an error if host and port do not form a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address: {}:{}", self.host, self.port))
    }

    /// WebSocket path under the alias, if the alias is enabled.
    #[must_use]
    pub fn alias_websocket_path(&self) -> Option<String> {
        let alias = self.alias.trim_end_matches('/');
        (!alias.is_empty()).then(|| format!("{}{}", alias, self.websocket_path))
    }

    /// Hub settings for the event loop.
    #[must_use]
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            history_size: self.hub.history_size,
            channel_capacity: self.hub.channel_capacity,
        }
    }

    /// Settings for each connection's pumps.
    #[must_use]
    pub fn pump_config(&self) -> PumpConfig {
        PumpConfig {
            send_queue_capacity: self.connection.send_queue_capacity,
            max_message_size: self.connection.max_message_size,
            ping_interval: Duration::from_millis(self.connection.ping_interval_ms),
            idle_timeout: Duration::from_millis(self.connection.idle_timeout_ms),
            write_timeout: Duration::from_millis(self.connection.write_timeout_ms),
        }
    }
}
