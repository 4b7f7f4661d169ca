//! Hub state and delivery policy.
//!
//! [`Hub`] owns the connection set and the chat history. It is only ever
//! touched from the event loop task; callbacks receive it by `&mut` and use
//! the `send_*` helpers to reach clients.
//!
//! Delivery never waits on a client. A connection whose outbound queue is
//! full is closed and removed on the spot.

use crate::connection::{ConnectionHandle, ConnectionId, EnqueueError};
use crate::history::History;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace, warn};
use webchat_protocol::{Message, OpCode};

/// Hub errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    /// No registered connection has this ID.
    #[error("Connection not found: {0}")]
    NotFound(ConnectionId),

    /// The event loop is no longer running.
    #[error("Hub event loop stopped")]
    Closed,
}

/// Result of a single delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The message was queued.
    Delivered,
    /// The queue was full; the connection has been dropped.
    Dropped,
    /// The transport already stopped reading; its unregister is pending.
    Closed,
    /// No such connection.
    Missing,
}

/// Hub counters, published after every event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HubStats {
    /// Registered connections.
    pub connections: usize,
    /// Messages currently held in history.
    pub history_len: usize,
    /// Events processed.
    pub events: u64,
    /// Inbound frames received.
    pub frames_in: u64,
    /// Messages queued for delivery.
    pub messages_out: u64,
    /// Connections dropped because their queue was full.
    pub forced_disconnects: u64,
    /// Inbound frames that failed to decode.
    pub decode_errors: u64,
    /// Callback invocations that reported failure.
    pub callback_errors: u64,
    /// Inbound messages with no opcode to dispatch.
    pub unhandled: u64,
}

/// The connection set, history, and the delivery helpers used by callbacks.
#[derive(Debug)]
pub struct Hub {
    connections: HashMap<ConnectionId, ConnectionHandle>,
    history: History,
    stats: HubStats,
}

impl Hub {
    /// Create an empty hub keeping `history_size` chat messages.
    #[must_use]
    pub fn new(history_size: usize) -> Self {
        Self {
            connections: HashMap::new(),
            history: History::with_capacity(history_size),
            stats: HubStats::default(),
        }
    }

    /// Add a connection to the set.
    ///
    /// Returns the handle previously registered under the same ID, if any.
    pub(crate) fn insert(&mut self, conn: ConnectionHandle) -> Option<ConnectionHandle> {
        self.connections.insert(conn.id(), conn)
    }

    /// Remove a connection from the set without closing it.
    pub(crate) fn remove(&mut self, id: ConnectionId) -> Option<ConnectionHandle> {
        self.connections.remove(&id)
    }

    pub(crate) fn push_history(&mut self, message: Arc<Message>) {
        self.history.push(message);
    }

    pub(crate) fn stats_mut(&mut self) -> &mut HubStats {
        &mut self.stats
    }

    /// Whether a connection is registered.
    #[must_use]
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Number of registered connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// IDs of all registered connections, in no particular order.
    #[must_use]
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.connections.keys().copied().collect()
    }

    /// Look up a connection by ID.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] if the connection is not registered.
    pub fn find_connection(&self, id: ConnectionId) -> Result<&ConnectionHandle, HubError> {
        self.connections.get(&id).ok_or(HubError::NotFound(id))
    }

    /// Look up a connection by ID for modification.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] if the connection is not registered.
    pub fn find_connection_mut(
        &mut self,
        id: ConnectionId,
    ) -> Result<&mut ConnectionHandle, HubError> {
        self.connections.get_mut(&id).ok_or(HubError::NotFound(id))
    }

    /// Recent chat messages, oldest first.
    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> HubStats {
        HubStats {
            connections: self.connections.len(),
            history_len: self.history.len(),
            ..self.stats
        }
    }

    /// Queue a message for one connection.
    ///
    /// A full queue drops the connection: it is removed from the set and its
    /// queue is closed, which tells the transport to hang up.
    pub fn send_unicast(&mut self, id: ConnectionId, message: impl Into<Arc<Message>>) -> Delivery {
        let Some(conn) = self.connections.get(&id) else {
            trace!(connection = %id, "Unicast to unknown connection");
            return Delivery::Missing;
        };

        match conn.enqueue(message.into()) {
            Ok(()) => {
                self.stats.messages_out += 1;
                Delivery::Delivered
            }
            Err(EnqueueError::Full) => {
                if let Some(conn) = self.connections.remove(&id) {
                    warn!(
                        connection = %id,
                        remote = conn.remote().unwrap_or("-"),
                        "Outbound queue full, dropping connection"
                    );
                    conn.close();
                }
                self.stats.forced_disconnects += 1;
                Delivery::Dropped
            }
            Err(EnqueueError::Closed) => {
                debug!(connection = %id, "Outbound queue closed by transport");
                Delivery::Closed
            }
        }
    }

    /// Queue a message for every registered connection.
    ///
    /// Each connection gets exactly one attempt. Returns the number of
    /// connections the message was queued for.
    pub fn send_broadcast(&mut self, message: impl Into<Arc<Message>>) -> usize {
        let message = message.into();
        let mut delivered = 0;

        for id in self.connection_ids() {
            if self.send_unicast(id, Arc::clone(&message)) == Delivery::Delivered {
                delivered += 1;
            }
        }

        trace!(op = %message.op, recipients = delivered, "Broadcast");
        delivered
    }

    /// Broadcast a system message with the given opcode and text.
    pub fn send(&mut self, op: OpCode, text: impl Into<String>) -> usize {
        self.send_broadcast(Message::new(op, text))
    }

    /// Broadcast a system notice.
    pub fn send_notice(&mut self, text: impl Into<String>) -> usize {
        self.send(OpCode::Notice, text)
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(crate::history::DEFAULT_HISTORY_SIZE)
    }
}
