//! JSON codec for message envelopes.
//!
//! One WebSocket frame carries exactly one JSON object, so no extra framing
//! is applied here.

use bytes::Bytes;
use thiserror::Error;

use crate::message::Message;

/// Maximum encoded message size (64 KiB).
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame exceeds maximum size.
    #[error("Frame size {0} exceeds maximum {MAX_FRAME_SIZE}")]
    FrameTooLarge(usize),

    /// Malformed or mistyped JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode a message to bytes.
///
/// # Errors
///
/// Returns an error if the message is too large or serialization fails.
pub fn encode(message: &Message) -> Result<Bytes, ProtocolError> {
    let payload = serde_json::to_vec(message)?;

    if payload.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(payload.len()));
    }

    Ok(Bytes::from(payload))
}

/// Encode a message for a text frame.
///
/// # Errors
///
/// Returns an error if the message is too large or serialization fails.
pub fn encode_text(message: &Message) -> Result<String, ProtocolError> {
    let payload = serde_json::to_string(message)?;

    if payload.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(payload.len()));
    }

    Ok(payload)
}

/// Decode a message from bytes.
///
/// Unknown opcodes decode successfully; deciding what to do with them is up
/// to the caller.
///
/// # Errors
///
/// Returns an error if the data is too large or is not a valid envelope.
pub fn decode(data: &[u8]) -> Result<Message, ProtocolError> {
    if data.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(data.len()));
    }

    let message = serde_json::from_slice(data)?;
    Ok(message)
}
