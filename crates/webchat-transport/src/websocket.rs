//! WebSocket transport implementation.
//!
//! This module provides a standalone WebSocket listener using tokio-tungstenite.

use async_trait::async_trait;
use bytes::Bytes;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message, WebSocketStream};
use tracing::{debug, info};

use crate::traits::{Incoming, Transport, TransportError, WireMessage};

/// WebSocket transport.
#[derive(Debug)]
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    /// Bind a WebSocket listener.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the address fails.
    pub async fn bind(addr: SocketAddr) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await?;

        info!("WebSocket transport listening on {}", listener.local_addr()?);

        Ok(Self { listener })
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    type Socket = WebSocketStream<TcpStream>;

    async fn accept(&self) -> Result<(Self::Socket, SocketAddr), TransportError> {
        let (stream, addr) = self.listener.accept().await?;

        debug!("Accepted TCP connection from {}", addr);

        let ws_stream = accept_async(stream)
            .await
            .map_err(|e| TransportError::Handshake(e.to_string()))?;

        debug!("WebSocket handshake completed with {}", addr);

        Ok((ws_stream, addr))
    }

    fn name(&self) -> &'static str {
        "websocket"
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }
}

impl WireMessage for Message {
    fn classify(self) -> Incoming {
        match self {
            Message::Text(text) => Incoming::Frame(Bytes::from(text)),
            Message::Binary(data) => Incoming::Frame(Bytes::from(data)),
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Incoming::Control,
            Message::Close(_) => Incoming::Close,
        }
    }

    fn text(text: String) -> Self {
        Message::Text(text)
    }

    fn ping() -> Self {
        Message::Ping(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tungstenite_message_classify() {
        assert_eq!(
            Message::Text("hi".into()).classify(),
            Incoming::Frame(Bytes::from_static(b"hi"))
        );
        assert_eq!(Message::Pong(vec![]).classify(), Incoming::Control);
        assert_eq!(Message::Close(None).classify(), Incoming::Close);
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let transport = WebSocketTransport::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = transport.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert_eq!(transport.name(), "websocket");
    }
}
