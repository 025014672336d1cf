//! Codec for encoding and decoding Parlor frames.
//!
//! WebSocket already delimits messages, so frames carry no length prefix.
//! Text frames hold JSON; binary frames hold named-field MessagePack.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default maximum frame size (64 KiB).
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame exceeds maximum size.
    #[error("Frame size {size} exceeds maximum {max}")]
    FrameTooLarge {
        /// Actual size in bytes.
        size: usize,
        /// Configured limit.
        max: usize,
    },

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MessagePack encoding error.
    #[error("Encoding error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// MessagePack decoding error.
    #[error("Decoding error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// Encoding used for outgoing frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// JSON in text frames.
    #[default]
    Json,
    /// MessagePack in binary frames.
    MessagePack,
}

/// A transport-neutral WebSocket payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireFrame {
    /// A text frame.
    Text(String),
    /// A binary frame.
    Binary(Bytes),
}

impl WireFrame {
    /// Payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            WireFrame::Text(text) => text.len(),
            WireFrame::Binary(data) => data.len(),
        }
    }

    /// Whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn check_size(size: usize, max: usize) -> Result<(), ProtocolError> {
    if size > max {
        return Err(ProtocolError::FrameTooLarge { size, max });
    }
    Ok(())
}

/// Encode a frame as JSON text.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_text<T: Serialize>(frame: &T) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(frame)?)
}

/// Encode a frame as MessagePack.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_binary<T: Serialize>(frame: &T) -> Result<Bytes, ProtocolError> {
    Ok(Bytes::from(rmp_serde::to_vec_named(frame)?))
}

/// Decode a JSON text frame.
///
/// # Errors
///
/// Returns an error if the text is not a valid frame.
pub fn decode_text<T: DeserializeOwned>(text: &str) -> Result<T, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

/// Decode a MessagePack binary frame.
///
/// # Errors
///
/// Returns an error if the data is not a valid frame.
pub fn decode_binary<T: DeserializeOwned>(data: &[u8]) -> Result<T, ProtocolError> {
    Ok(rmp_serde::from_slice(data)?)
}

/// Codec with a size limit and an outgoing encoding.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    encoding: Encoding,
    max_frame_size: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(Encoding::default(), MAX_FRAME_SIZE)
    }
}

impl FrameCodec {
    /// Create a new codec instance.
    #[must_use]
    pub fn new(encoding: Encoding, max_frame_size: usize) -> Self {
        Self {
            encoding,
            max_frame_size,
        }
    }

    /// The outgoing encoding.
    #[must_use]
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// The size limit in bytes.
    #[must_use]
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Encode a frame with the configured encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the result is too large.
    pub fn encode<T: Serialize>(&self, frame: &T) -> Result<WireFrame, ProtocolError> {
        let wire = match self.encoding {
            Encoding::Json => WireFrame::Text(encode_text(frame)?),
            Encoding::MessagePack => WireFrame::Binary(encode_binary(frame)?),
        };
        check_size(wire.len(), self.max_frame_size)?;
        Ok(wire)
    }

    /// Decode a frame, picking the format from the frame kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is too large or invalid.
    pub fn decode<T: DeserializeOwned>(&self, wire: &WireFrame) -> Result<T, ProtocolError> {
        check_size(wire.len(), self.max_frame_size)?;
        match wire {
            WireFrame::Text(text) => decode_text(text),
            WireFrame::Binary(data) => decode_binary(data),
        }
    }
}
