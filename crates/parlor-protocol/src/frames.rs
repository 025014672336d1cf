//! Frame types for the Parlor protocol.
//!
//! Clients send [`ClientFrame`]s and receive [`ServerFrame`]s. The same
//! structures travel as JSON in text frames or MessagePack in binary frames.

use serde::{Deserialize, Serialize};

/// Error code: the frame could not be decoded.
pub const ERROR_INVALID_FRAME: u16 = 1001;

/// Error code: the frame exceeded the size limit.
pub const ERROR_FRAME_TOO_LARGE: u16 = 1009;

/// A frame sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientFrame {
    /// Message text.
    pub message: String,
}

impl ClientFrame {
    /// Create a new client frame.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A frame sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    /// A chat message relayed from the room.
    #[serde(rename = "message")]
    Message {
        /// Sender display name.
        name: String,
        /// Message text.
        message: String,
        /// Send time in unix milliseconds.
        when: u64,
        /// Sender avatar URL.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        avatar_url: Option<String>,
    },

    /// The previous client frame was rejected.
    #[serde(rename = "error")]
    Error {
        /// Error code.
        code: u16,
        /// Human-readable error message.
        message: String,
    },
}

impl ServerFrame {
    /// Create a new Message frame.
    #[must_use]
    pub fn message(name: impl Into<String>, message: impl Into<String>, when: u64) -> Self {
        ServerFrame::Message {
            name: name.into(),
            message: message.into(),
            when,
            avatar_url: None,
        }
    }

    /// Create a new Error frame.
    #[must_use]
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        ServerFrame::Error {
            code,
            message: message.into(),
        }
    }

    /// Wire name of the frame type.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ServerFrame::Message { .. } => "message",
            ServerFrame::Error { .. } => "error",
        }
    }
}
