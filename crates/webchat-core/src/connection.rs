//! Connection handles.
//!
//! A [`ConnectionHandle`] is created by the transport when a client is
//! accepted and then handed to the hub, which owns it for as long as the
//! client is registered. The transport keeps the matching [`Outbound`]
//! receiver and writes whatever arrives there to the network.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use webchat_protocol::Message;

/// Default outbound queue capacity.
pub const DEFAULT_SEND_QUEUE_CAPACITY: usize = 256;

static NEXT_CONNECTION_ID: AtomicI64 = AtomicI64::new(1);

/// Process-unique connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub i64);

impl ConnectionId {
    /// Allocate the next connection ID.
    ///
    /// IDs increase monotonically and are never reused within a process.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID.
    #[must_use]
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ConnectionId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Why a message could not be queued for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EnqueueError {
    /// The outbound queue is at capacity.
    #[error("Outbound queue full")]
    Full,

    /// The transport has stopped draining the queue.
    #[error("Outbound queue closed")]
    Closed,
}

/// Receiving end of a connection's outbound queue.
#[derive(Debug)]
pub struct Outbound {
    rx: mpsc::Receiver<Arc<Message>>,
}

impl Outbound {
    /// Wait for the next message.
    ///
    /// Returns `None` once the hub has closed the queue and every queued
    /// message has been received.
    pub async fn recv(&mut self) -> Option<Arc<Message>> {
        self.rx.recv().await
    }

    /// Take a queued message without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<Message>> {
        self.rx.try_recv().ok()
    }

    /// Whether the hub has closed the queue.
    ///
    /// Messages queued before the close may still be pending.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.rx.is_closed()
    }
}

/// Read-only view of a connection, handed to callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Connection ID.
    pub id: ConnectionId,
    /// Current display name, empty until the client picks one.
    pub name: String,
    /// Remote address, informational only.
    pub remote: Option<String>,
}

/// The hub's handle on one client.
#[derive(Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    name: String,
    remote: Option<String>,
    queue: mpsc::Sender<Arc<Message>>,
}

impl ConnectionHandle {
    /// Create a handle and its outbound queue.
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn new(id: ConnectionId, remote: Option<String>, capacity: usize) -> (Self, Outbound) {
        let (queue, rx) = mpsc::channel(capacity.max(1));
        let handle = Self {
            id,
            name: String::new(),
            remote,
            queue,
        };
        (handle, Outbound { rx })
    }

    /// Get the connection ID.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Get the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the display name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Get the remote address, if known.
    #[must_use]
    pub fn remote(&self) -> Option<&str> {
        self.remote.as_deref()
    }

    /// Snapshot this connection for a callback.
    #[must_use]
    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            id: self.id,
            name: self.name.clone(),
            remote: self.remote.clone(),
        }
    }

    /// Queue a message without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`EnqueueError::Full`] when the queue is at capacity and
    /// [`EnqueueError::Closed`] when the transport has dropped its receiver.
    pub fn enqueue(&self, message: Arc<Message>) -> Result<(), EnqueueError> {
        self.queue.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
            mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }

    /// Close the outbound queue.
    ///
    /// Consumes the handle, so nothing can be queued afterwards. Messages
    /// already queued are still delivered to the transport.
    pub fn close(self) {
        drop(self.queue);
    }
}
