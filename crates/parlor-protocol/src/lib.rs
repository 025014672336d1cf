//! # parlor-protocol
//!
//! Wire protocol definitions for the Parlor chat server.
//!
//! Clients send `{"message": "..."}` and receive tagged server frames:
//!
//! - `message` - A chat message relayed by the room
//! - `error` - The previous client frame was rejected
//!
//! ## Example
//!
//! ```rust
//! use parlor_protocol::{codec::FrameCodec, ServerFrame};
//!
//! let codec = FrameCodec::default();
//! let frame = ServerFrame::message("Ada", "Hello, world!", 0);
//!
//! let wire = codec.encode(&frame).unwrap();
//! let decoded: ServerFrame = codec.decode(&wire).unwrap();
//! assert_eq!(decoded, frame);
//! ```

pub mod codec;
pub mod frames;

pub use codec::{Encoding, FrameCodec, ProtocolError, WireFrame, MAX_FRAME_SIZE};
pub use frames::{ClientFrame, ServerFrame};
