//! Metrics collection and export for the chat server.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tokio::sync::watch;
use tracing::info;
use webchat_core::HubStats;

/// Metric names.
pub mod names {
    pub const CONNECTIONS_TOTAL: &str = "webchat_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "webchat_connections_active";
    pub const HUB_CONNECTIONS: &str = "webchat_hub_connections";
    pub const HISTORY_LENGTH: &str = "webchat_history_length";
    pub const HUB_EVENTS_TOTAL: &str = "webchat_hub_events_total";
    pub const FRAMES_IN_TOTAL: &str = "webchat_frames_in_total";
    pub const MESSAGES_OUT_TOTAL: &str = "webchat_messages_out_total";
    pub const FORCED_DISCONNECTS_TOTAL: &str = "webchat_forced_disconnects_total";
    pub const ERRORS_TOTAL: &str = "webchat_errors_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    // Describe metrics
    metrics::describe_counter!(
        names::CONNECTIONS_TOTAL,
        "Total number of WebSocket upgrades since server start"
    );
    metrics::describe_gauge!(
        names::CONNECTIONS_ACTIVE,
        "Current number of open WebSocket sessions"
    );
    metrics::describe_gauge!(
        names::HUB_CONNECTIONS,
        "Connections currently registered with the hub"
    );
    metrics::describe_gauge!(names::HISTORY_LENGTH, "Chat messages held for replay");
    metrics::describe_counter!(names::HUB_EVENTS_TOTAL, "Events processed by the hub loop");
    metrics::describe_counter!(names::FRAMES_IN_TOTAL, "Inbound frames received by the hub");
    metrics::describe_counter!(
        names::MESSAGES_OUT_TOTAL,
        "Messages queued to connections"
    );
    metrics::describe_counter!(
        names::FORCED_DISCONNECTS_TOTAL,
        "Connections dropped for a full outbound queue"
    );
    metrics::describe_counter!(names::ERRORS_TOTAL, "Total number of errors by kind");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a new connection.
pub fn record_connection() {
    counter!(names::CONNECTIONS_TOTAL).increment(1);
    gauge!(names::CONNECTIONS_ACTIVE).increment(1.0);
}

/// Record a disconnection.
pub fn record_disconnection() {
    gauge!(names::CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Mirror a hub stats snapshot into the exported metrics.
pub fn record_hub_stats(stats: &HubStats) {
    gauge!(names::HUB_CONNECTIONS).set(stats.connections as f64);
    gauge!(names::HISTORY_LENGTH).set(stats.history_len as f64);
    counter!(names::HUB_EVENTS_TOTAL).absolute(stats.events);
    counter!(names::FRAMES_IN_TOTAL).absolute(stats.frames_in);
    counter!(names::MESSAGES_OUT_TOTAL).absolute(stats.messages_out);
    counter!(names::FORCED_DISCONNECTS_TOTAL).absolute(stats.forced_disconnects);
    counter!(names::ERRORS_TOTAL, "type" => "decode").absolute(stats.decode_errors);
    counter!(names::ERRORS_TOTAL, "type" => "callback").absolute(stats.callback_errors);
    counter!(names::ERRORS_TOTAL, "type" => "unhandled").absolute(stats.unhandled);
}

/// Export hub stats every time the hub publishes a new snapshot.
///
/// The task ends when the hub loop stops.
pub fn spawn_hub_stats_exporter(mut stats: watch::Receiver<HubStats>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let snapshot = *stats.borrow_and_update();
            record_hub_stats(&snapshot);
            if stats.changed().await.is_err() {
                break;
            }
        }
    })
}

/// Metrics guard that records disconnection on drop.
pub struct ConnectionMetricsGuard;

impl ConnectionMetricsGuard {
    /// Create a new metrics guard, recording a connection.
    #[must_use]
    pub fn new() -> Self {
        record_connection();
        Self
    }
}

impl Default for ConnectionMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionMetricsGuard {
    fn drop(&mut self) {
        record_disconnection();
    }
}
