//! Transport abstraction traits.
//!
//! [`WireMessage`] lets the pumps work with any WebSocket library's message
//! type; [`Transport`] is anything that can accept new sockets.

use async_trait::async_trait;
use bytes::Bytes;
use std::net::SocketAddr;
use thiserror::Error;
use webchat_core::HubError;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Nothing was received or written in time.
    #[error("Connection timed out")]
    Timeout,

    /// Incoming message exceeds the configured limit.
    #[error("Message size {0} exceeds limit")]
    MessageTooLarge(usize),

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to receive data.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// WebSocket handshake failed.
    #[error("WebSocket handshake failed: {0}")]
    Handshake(String),

    /// The hub is no longer accepting events.
    #[error("Hub error: {0}")]
    Hub(#[from] HubError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// What the read pump should do with an incoming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// A data frame to hand to the hub.
    Frame(Bytes),
    /// Ping/pong and other control traffic.
    Control,
    /// The peer is closing.
    Close,
}

/// A WebSocket library's message type.
pub trait WireMessage: Sized + Send + Unpin + 'static {
    /// Classify an incoming message.
    fn classify(self) -> Incoming;

    /// Build a text frame.
    fn text(text: String) -> Self;

    /// Build a keepalive ping.
    fn ping() -> Self;
}

/// A source of new client sockets.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Socket type produced by this transport.
    type Socket: Send + 'static;

    /// Accept the next connection, completing any handshake.
    async fn accept(&self) -> Result<(Self::Socket, SocketAddr), TransportError>;

    /// Get the transport name (e.g., "websocket").
    fn name(&self) -> &'static str;

    /// Local address, if bound to one.
    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }
}

impl WireMessage for axum::extract::ws::Message {
    fn classify(self) -> Incoming {
        use axum::extract::ws::Message;

        match self {
            Message::Text(text) => Incoming::Frame(Bytes::from(text)),
            Message::Binary(data) => Incoming::Frame(Bytes::from(data)),
            Message::Ping(_) | Message::Pong(_) => Incoming::Control,
            Message::Close(_) => Incoming::Close,
        }
    }

    fn text(text: String) -> Self {
        axum::extract::ws::Message::Text(text)
    }

    fn ping() -> Self {
        axum::extract::ws::Message::Ping(Vec::new())
    }
}
