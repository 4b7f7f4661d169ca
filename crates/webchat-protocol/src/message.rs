//! The message envelope exchanged between clients and the hub.

use crate::opcode::OpCode;
use serde::{Deserialize, Serialize};

/// A wire-level message.
///
/// `id` identifies the sending connection. Whatever a client puts there is
/// overwritten by the hub before the message is dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Sending connection ID, assigned by the hub.
    #[serde(default)]
    pub id: i64,
    /// Message kind.
    pub op: OpCode,
    /// Display name supplied by the sender (advisory only).
    #[serde(default)]
    pub from: String,
    /// Message body.
    #[serde(default, rename = "message")]
    pub text: String,
    /// Ask the client to pop up a notification.
    #[serde(default)]
    pub notify: bool,
}

impl Message {
    /// Create a new message with the given opcode and body.
    #[must_use]
    pub fn new(op: OpCode, text: impl Into<String>) -> Self {
        Self {
            id: 0,
            op,
            from: String::new(),
            text: text.into(),
            notify: false,
        }
    }

    /// Create a chat message.
    #[must_use]
    pub fn chat(from: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(OpCode::Message, text).with_from(from)
    }

    /// Create a system notice.
    #[must_use]
    pub fn notice(text: impl Into<String>) -> Self {
        Self::new(OpCode::Notice, text)
    }

    /// Set the sender display name.
    #[must_use]
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = from.into();
        self
    }

    /// Set the notification hint.
    #[must_use]
    pub fn with_notify(mut self, notify: bool) -> Self {
        self.notify = notify;
        self
    }

    /// Set the sender connection ID.
    #[must_use]
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    /// Copy of this message carrying a different opcode.
    #[must_use]
    pub fn restamped(&self, op: OpCode) -> Self {
        Self {
            op,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_builders() {
        let msg = Message::chat("alice", "hi").with_notify(true).with_id(3);
        assert_eq!(msg.op, OpCode::Message);
        assert_eq!(msg.from, "alice");
        assert_eq!(msg.text, "hi");
        assert!(msg.notify);
        assert_eq!(msg.id, 3);

        let notice = Message::notice("server restarting");
        assert_eq!(notice.op, OpCode::Notice);
        assert!(notice.from.is_empty());
    }

    #[test]
    fn test_restamped_keeps_fields() {
        let msg = Message::chat("bob", "earlier").with_id(9);
        let replay = msg.restamped(OpCode::History);
        assert_eq!(replay.op, OpCode::History);
        assert_eq!(replay.id, 9);
        assert_eq!(replay.text, "earlier");
        assert_eq!(msg.op, OpCode::Message);
    }
}
