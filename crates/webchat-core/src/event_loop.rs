//! The hub event loop.
//!
//! [`HubRunner`] is the single consumer of three channels (register,
//! unregister, inbound). It processes one event at a time, so the connection
//! set and the history only ever change on the runner's task. Transports
//! feed it through a cloneable [`HubHandle`].

use crate::callbacks::CallbackRegistry;
use crate::connection::{ConnectionHandle, ConnectionId, ConnectionInfo};
use crate::history::DEFAULT_HISTORY_SIZE;
use crate::hub::{Hub, HubError, HubStats};
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, trace, warn};
use webchat_protocol::{codec, Message, OpCode};

/// Hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Number of chat messages kept for replay.
    pub history_size: usize,
    /// Capacity of each of the hub's input channels.
    pub channel_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            history_size: DEFAULT_HISTORY_SIZE,
            channel_capacity: 64,
        }
    }
}

/// One unit of work for the hub.
#[derive(Debug)]
pub enum HubEvent {
    /// Add a connection to the set.
    Register(ConnectionHandle),
    /// Remove a connection and close its queue.
    Unregister(ConnectionId),
    /// A raw frame received from a connection.
    Inbound {
        /// Originating connection.
        from: ConnectionId,
        /// Undecoded frame.
        frame: Bytes,
    },
}

#[derive(Debug)]
struct RegisterRequest {
    conn: ConnectionHandle,
    done: oneshot::Sender<()>,
}

/// Transport-facing handle to a running hub.
#[derive(Debug, Clone)]
pub struct HubHandle {
    register: mpsc::Sender<RegisterRequest>,
    unregister: mpsc::Sender<ConnectionId>,
    inbound: mpsc::Sender<(ConnectionId, Bytes)>,
    stats: watch::Receiver<HubStats>,
}

impl HubHandle {
    /// Register a connection.
    ///
    /// Resolves once the hub has added the connection to its set, so frames
    /// sent afterwards are never seen before the registration.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the event loop has stopped.
    pub async fn register(&self, conn: ConnectionHandle) -> Result<(), HubError> {
        let (done, registered) = oneshot::channel();
        self.register
            .send(RegisterRequest { conn, done })
            .await
            .map_err(|_| HubError::Closed)?;
        registered.await.map_err(|_| HubError::Closed)
    }

    /// Ask the hub to remove a connection.
    ///
    /// Unregistering a connection that is already gone is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the event loop has stopped.
    pub async fn unregister(&self, id: ConnectionId) -> Result<(), HubError> {
        self.unregister.send(id).await.map_err(|_| HubError::Closed)
    }

    /// Forward a raw frame received from a connection.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the event loop has stopped.
    pub async fn inbound(&self, from: ConnectionId, frame: impl Into<Bytes>) -> Result<(), HubError> {
        self.inbound
            .send((from, frame.into()))
            .await
            .map_err(|_| HubError::Closed)
    }

    /// Latest published hub counters.
    #[must_use]
    pub fn stats(&self) -> HubStats {
        *self.stats.borrow()
    }

    /// Watch hub counters as they change.
    #[must_use]
    pub fn subscribe_stats(&self) -> watch::Receiver<HubStats> {
        self.stats.clone()
    }
}

/// Owner of the hub state and the consuming end of its channels.
pub struct HubRunner {
    hub: Hub,
    callbacks: CallbackRegistry,
    register_rx: mpsc::Receiver<RegisterRequest>,
    unregister_rx: mpsc::Receiver<ConnectionId>,
    inbound_rx: mpsc::Receiver<(ConnectionId, Bytes)>,
    stats_tx: watch::Sender<HubStats>,
}

impl HubRunner {
    /// Create a runner and the handle used to feed it.
    #[must_use]
    pub fn new(config: HubConfig, callbacks: CallbackRegistry) -> (Self, HubHandle) {
        info!("Creating hub with config: {:?}", config);

        let capacity = config.channel_capacity.max(1);
        let (register, register_rx) = mpsc::channel(capacity);
        let (unregister, unregister_rx) = mpsc::channel(capacity);
        let (inbound, inbound_rx) = mpsc::channel(capacity);
        let (stats_tx, stats) = watch::channel(HubStats::default());

        let runner = Self {
            hub: Hub::new(config.history_size),
            callbacks,
            register_rx,
            unregister_rx,
            inbound_rx,
            stats_tx,
        };
        let handle = HubHandle {
            register,
            unregister,
            inbound,
            stats,
        };

        (runner, handle)
    }

    /// The hub state.
    #[must_use]
    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Run until every [`HubHandle`] has been dropped.
    pub async fn run(mut self) {
        info!("Hub event loop started");

        loop {
            tokio::select! {
                Some(RegisterRequest { conn, done }) = self.register_rx.recv() => {
                    self.process(HubEvent::Register(conn));
                    // The transport may have given up waiting.
                    let _ = done.send(());
                }
                Some(id) = self.unregister_rx.recv() => {
                    self.process(HubEvent::Unregister(id));
                }
                Some((from, frame)) = self.inbound_rx.recv() => {
                    self.process(HubEvent::Inbound { from, frame });
                }
                else => break,
            }
        }

        info!("Hub event loop stopped");
    }

    /// Handle exactly one event.
    pub fn process(&mut self, event: HubEvent) {
        match event {
            HubEvent::Register(conn) => self.on_register(conn),
            HubEvent::Unregister(id) => self.on_unregister(id),
            HubEvent::Inbound { from, frame } => self.on_inbound(from, &frame),
        }

        self.hub.stats_mut().events += 1;
        self.stats_tx.send_replace(self.hub.stats());
    }

    fn on_register(&mut self, conn: ConnectionHandle) {
        info!(
            connection = %conn.id(),
            remote = conn.remote().unwrap_or("-"),
            "Register connection"
        );

        let info = conn.info();
        if let Some(previous) = self.hub.insert(conn) {
            warn!(connection = %info.id, "Connection ID registered twice, closing the old handle");
            previous.close();
        }

        self.dispatch(OpCode::Register, &info, None);
    }

    fn on_unregister(&mut self, id: ConnectionId) {
        let Some(conn) = self.hub.remove(id) else {
            debug!(connection = %id, "Unregister for connection already removed");
            return;
        };

        info!(
            connection = %id,
            remote = conn.remote().unwrap_or("-"),
            "Unregister connection"
        );

        let info = conn.info();
        conn.close();
        self.dispatch(OpCode::Unregister, &info, None);
    }

    fn on_inbound(&mut self, from: ConnectionId, frame: &[u8]) {
        self.hub.stats_mut().frames_in += 1;

        let mut message = match codec::decode(frame) {
            Ok(message) => message,
            Err(e) => {
                warn!(connection = %from, bytes = frame.len(), error = %e, "Dropping undecodable frame");
                self.hub.stats_mut().decode_errors += 1;
                return;
            }
        };
        message.id = from.get();

        let info = match self.hub.find_connection(from) {
            Ok(conn) => conn.info(),
            Err(e) => {
                warn!(connection = %from, op = %message.op, error = %e, "Dropping frame from unregistered connection");
                return;
            }
        };

        if !message.op.is_client_op() {
            warn!(connection = %from, op = %message.op, "Unhandled op");
            self.hub.stats_mut().unhandled += 1;
            return;
        }

        trace!(connection = %from, op = %message.op, bytes = frame.len(), "Inbound message");

        if message.op == OpCode::Message {
            self.hub.push_history(Arc::new(message.clone()));
        }

        self.dispatch(message.op, &info, Some(&message));
    }

    fn dispatch(&mut self, op: OpCode, conn: &ConnectionInfo, message: Option<&Message>) {
        let outcome = self.callbacks.dispatch(op, &mut self.hub, conn, message);
        self.hub.stats_mut().callback_errors += outcome.failed as u64;

        debug!(
            op = %op,
            connection = %conn.id,
            invoked = outcome.invoked,
            failed = outcome.failed,
            "Dispatched"
        );
    }
}

impl std::fmt::Debug for HubRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubRunner")
            .field("hub", &self.hub)
            .field("callbacks", &self.callbacks)
            .finish_non_exhaustive()
    }
}
