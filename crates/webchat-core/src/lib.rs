//! # webchat-core
//!
//! The hub of the webchat service: the single place where connections are
//! registered, messages are fanned out, and recent history is kept.
//!
//! This crate provides:
//!
//! - **Connection** - The hub's handle on one client and its outbound queue
//! - **History** - Bounded window of recent chat messages
//! - **Callbacks** - Opcode to handler-chain registry
//! - **Hub** - Connection set, delivery policy and the event loop
//! - **Chat** - Default handlers (history replay, notices, renames)
//!
//! ## Architecture
//!
//! ```text
//!  transport ──register/unregister/inbound──▶ ┌──────────────┐
//!                                             │  HubRunner   │──▶ CallbackRegistry
//!  transport ◀────────── Outbound ─────────── │  (one task)  │◀── handlers use Hub
//!                                             └──────────────┘
//! ```
//!
//! Only the runner task touches the connection set and history. Transports
//! talk to it through a cloneable [`HubHandle`] and drain their own
//! [`Outbound`] queue.

pub mod callbacks;
pub mod chat;
pub mod connection;
pub mod event_loop;
pub mod history;
pub mod hub;

pub use callbacks::{Callback, CallbackError, CallbackRegistry, DispatchOutcome};
pub use connection::{ConnectionHandle, ConnectionId, ConnectionInfo, EnqueueError, Outbound};
pub use event_loop::{HubConfig, HubEvent, HubHandle, HubRunner};
pub use history::History;
pub use hub::{Delivery, Hub, HubError, HubStats};
pub use webchat_protocol::{Message, OpCode};
