//! # webchat-transport
//!
//! Moves frames between WebSocket clients and the webchat hub.
//!
//! Each accepted socket gets two pumps:
//!
//! - **read pump** - forwards every text/binary frame to the hub
//! - **write pump** - drains the connection's outbound queue to the socket
//!
//! The pumps only talk to the hub through a [`HubHandle`](webchat_core::HubHandle)
//! and the connection's own queue; they never see hub state.
//!
//! ```rust,ignore
//! use webchat_transport::{pump, PumpConfig};
//!
//! async fn on_upgrade(socket: axum::extract::ws::WebSocket, hub: webchat_core::HubHandle) {
//!     pump::run_connection(hub, socket, None, PumpConfig::default()).await;
//! }
//! ```

pub mod accept;
pub mod pump;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use accept::serve;
pub use pump::{run_connection, PumpConfig};
pub use traits::{Incoming, Transport, TransportError, WireMessage};

#[cfg(feature = "websocket")]
pub use websocket::WebSocketTransport;
