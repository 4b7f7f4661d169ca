//! Opcodes for the webchat protocol.
//!
//! The set of opcodes is closed: new values may be added but existing values
//! are never reinterpreted. Values the decoder does not recognise are kept in
//! [`OpCode::Unknown`] so the hub can log them instead of rejecting the frame.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Opcode identifying the semantic kind of a message.
///
/// Equality and hashing follow the wire value, so `Unknown(2)` is the same
/// opcode as `Message`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum OpCode {
    /// A client has connected.
    Register,
    /// A client has disconnected.
    Unregister,
    /// Chat text.
    Message,
    /// Informational text, likely from the system.
    Notice,
    /// A user has joined.
    Join,
    /// A user has changed their display name.
    Nick,
    /// A chat message replayed from history.
    History,
    /// Any value outside the known set. Built through [`OpCode::from_value`]
    /// this only ever holds unrecognised values.
    Unknown(i64),
}

impl OpCode {
    /// Opcode for a wire value.
    #[must_use]
    pub const fn from_value(value: i64) -> Self {
        match value {
            0 => OpCode::Register,
            1 => OpCode::Unregister,
            2 => OpCode::Message,
            3 => OpCode::Notice,
            4 => OpCode::Join,
            5 => OpCode::Nick,
            100 => OpCode::History,
            other => OpCode::Unknown(other),
        }
    }

    /// The same opcode with a known value moved out of `Unknown`.
    #[must_use]
    pub const fn normalized(self) -> Self {
        Self::from_value(self.value())
    }

    /// Wire value of this opcode.
    #[must_use]
    pub const fn value(self) -> i64 {
        match self {
            OpCode::Register => 0,
            OpCode::Unregister => 1,
            OpCode::Message => 2,
            OpCode::Notice => 3,
            OpCode::Join => 4,
            OpCode::Nick => 5,
            OpCode::History => 100,
            OpCode::Unknown(v) => v,
        }
    }

    /// Whether this opcode belongs to the known set.
    #[must_use]
    pub const fn is_known(self) -> bool {
        !matches!(self.normalized(), OpCode::Unknown(_))
    }

    /// Whether a client is allowed to send this opcode.
    ///
    /// Lifecycle opcodes are produced by the hub itself and `History` only
    /// ever flows from the server to clients.
    #[must_use]
    pub const fn is_client_op(self) -> bool {
        matches!(
            self.normalized(),
            OpCode::Message | OpCode::Notice | OpCode::Join | OpCode::Nick
        )
    }
}

impl From<i64> for OpCode {
    fn from(value: i64) -> Self {
        Self::from_value(value)
    }
}

impl PartialEq for OpCode {
    fn eq(&self, other: &Self) -> bool {
        self.value() == other.value()
    }
}

impl Eq for OpCode {}

impl Hash for OpCode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value().hash(state);
    }
}

impl From<OpCode> for i64 {
    fn from(op: OpCode) -> i64 {
        op.value()
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.normalized() {
            OpCode::Register => f.write_str("RegisterOp"),
            OpCode::Unregister => f.write_str("UnregisterOp"),
            OpCode::Message => f.write_str("MessageOp"),
            OpCode::Notice => f.write_str("NoticeOp"),
            OpCode::Join => f.write_str("JoinOp"),
            OpCode::Nick => f.write_str("NickOp"),
            OpCode::History => f.write_str("HistoryOp"),
            OpCode::Unknown(v) => write!(f, "OpCode({v})"),
        }
    }
}
