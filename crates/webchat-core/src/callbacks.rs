//! Opcode callback registry.
//!
//! Handlers are registered per opcode and run in registration order. A
//! failing handler is logged and the rest of the chain still runs.

use crate::connection::{ConnectionId, ConnectionInfo};
use crate::hub::Hub;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{trace, warn};
use webchat_protocol::{Message, OpCode};

/// Errors reported by callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallbackError {
    /// The message referred to a connection that is no longer registered.
    #[error("Connection not found: {0}")]
    LookupMiss(ConnectionId),

    /// The callback needs a message but was dispatched without one.
    #[error("Missing message payload for {0}")]
    MissingPayload(OpCode),

    /// Any other handler failure.
    #[error("{0}")]
    Failed(String),
}

/// A registered handler.
///
/// Receives the opcode being dispatched, the hub, the originating connection
/// and, for inbound messages, the decoded message.
pub type Callback = Box<
    dyn Fn(OpCode, &mut Hub, &ConnectionInfo, Option<&Message>) -> Result<(), CallbackError>
        + Send
        + Sync,
>;

/// Summary of one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Handlers invoked.
    pub invoked: usize,
    /// Handlers that returned an error.
    pub failed: usize,
}

impl DispatchOutcome {
    /// Whether every invoked handler succeeded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.failed == 0
    }
}

/// Mapping from opcode to an ordered list of handlers.
#[derive(Default)]
pub struct CallbackRegistry {
    handlers: HashMap<OpCode, Vec<Callback>>,
}

impl CallbackRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler to an opcode's chain.
    pub fn on<F>(&mut self, op: OpCode, handler: F) -> &mut Self
    where
        F: Fn(OpCode, &mut Hub, &ConnectionInfo, Option<&Message>) -> Result<(), CallbackError>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.entry(op).or_default().push(Box::new(handler));
        self
    }

    /// Number of handlers registered for an opcode.
    #[must_use]
    pub fn handler_count(&self, op: OpCode) -> usize {
        self.handlers.get(&op).map_or(0, Vec::len)
    }

    /// Run every handler registered for `op`, in order.
    ///
    /// Opcodes without handlers succeed trivially.
    pub fn dispatch(
        &self,
        op: OpCode,
        hub: &mut Hub,
        conn: &ConnectionInfo,
        message: Option<&Message>,
    ) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();

        let Some(chain) = self.handlers.get(&op) else {
            trace!(op = %op, connection = %conn.id, "No handlers registered");
            return outcome;
        };

        for (index, handler) in chain.iter().enumerate() {
            outcome.invoked += 1;
            if let Err(e) = handler(op, hub, conn, message) {
                outcome.failed += 1;
                warn!(op = %op, connection = %conn.id, handler = index, error = %e, "Callback failed");
            }
        }

        outcome
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<_, _> = self.handlers.iter().map(|(op, c)| (*op, c.len())).collect();
        f.debug_struct("CallbackRegistry")
            .field("handlers", &counts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn info() -> ConnectionInfo {
        ConnectionInfo {
            id: ConnectionId(1),
            name: String::new(),
            remote: None,
        }
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut registry = CallbackRegistry::new();

        for tag in ["first", "second", "third"] {
            let calls = Arc::clone(&calls);
            registry.on(OpCode::Message, move |_, _, _, _| {
                calls.lock().unwrap().push(tag);
                Ok(())
            });
        }
        assert_eq!(registry.handler_count(OpCode::Message), 3);

        let mut hub = Hub::default();
        let outcome = registry.dispatch(OpCode::Message, &mut hub, &info(), None);

        assert_eq!(outcome, DispatchOutcome { invoked: 3, failed: 0 });
        assert_eq!(*calls.lock().unwrap(), ["first", "second", "third"]);
    }

    #[test]
    fn test_failure_does_not_stop_chain() {
        let calls = Arc::new(Mutex::new(0));
        let mut registry = CallbackRegistry::new();

        registry.on(OpCode::Notice, |_, _, _, _| {
            Err(CallbackError::Failed("boom".into()))
        });
        let counter = Arc::clone(&calls);
        registry.on(OpCode::Notice, move |_, _, _, _| {
            *counter.lock().unwrap() += 1;
            Ok(())
        });

        let mut hub = Hub::default();
        let outcome = registry.dispatch(OpCode::Notice, &mut hub, &info(), None);

        assert_eq!(outcome.invoked, 2);
        assert_eq!(outcome.failed, 1);
        assert!(!outcome.is_ok());
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_unregistered_op_is_noop() {
        let registry = CallbackRegistry::new();
        let mut hub = Hub::default();

        let outcome = registry.dispatch(OpCode::Join, &mut hub, &info(), None);
        assert_eq!(outcome, DispatchOutcome::default());
        assert!(outcome.is_ok());
    }

    #[test]
    fn test_handler_receives_op_and_message() {
        let seen = Arc::new(Mutex::new(None));
        let mut registry = CallbackRegistry::new();
        let slot = Arc::clone(&seen);
        registry.on(OpCode::Nick, move |op, _, conn, msg| {
            *slot.lock().unwrap() = Some((op, conn.id, msg.map(|m| m.from.clone())));
            Ok(())
        });

        let mut hub = Hub::default();
        let msg = Message::new(OpCode::Nick, "").with_from("hal");
        registry.dispatch(OpCode::Nick, &mut hub, &info(), Some(&msg));

        assert_eq!(
            *seen.lock().unwrap(),
            Some((OpCode::Nick, ConnectionId(1), Some("hal".to_string())))
        );
    }
}
