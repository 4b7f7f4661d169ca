//! # webchat-protocol
//!
//! Wire protocol definitions for the webchat hub.
//!
//! Every frame exchanged between a client and the hub is a single JSON
//! object, the message envelope:
//!
//! ```text
//! { "id": int64, "op": int, "from": string, "message": string, "notify": bool }
//! ```
//!
//! ## Opcodes
//!
//! - `Message` - Chat text, broadcast and kept in history
//! - `Notice` - Informational text, usually from the system
//! - `Join` / `Nick` - Presence and display-name changes
//! - `Register` / `Unregister` - Hub lifecycle events (never sent by clients)
//! - `History` - Replayed chat messages
//!
//! ## Example
//!
//! ```rust
//! use webchat_protocol::{codec, Message, OpCode};
//!
//! let msg = Message::chat("alice", "hello");
//! let encoded = codec::encode(&msg).unwrap();
//! let decoded = codec::decode(&encoded).unwrap();
//! assert_eq!(decoded.op, OpCode::Message);
//! ```

pub mod codec;
pub mod message;
pub mod opcode;

pub use codec::{decode, encode, encode_text, ProtocolError};
pub use message::Message;
pub use opcode::OpCode;
