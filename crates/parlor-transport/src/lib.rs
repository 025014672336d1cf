//! # parlor-transport
//!
//! Transport layer for the Parlor chat server.
//!
//! This crate connects accepted connections to a room:
//!
//! - **Connection traits** - A duplex connection split into reader and writer halves
//! - **WebSocket** - The axum WebSocket implementation
//! - **Memory** - An in-process pair for tests and benchmarks
//! - **Pumps** - The inbound and outbound loops run for every client
//!
//! ## Serving a client
//!
//! ```rust,ignore
//! use parlor_core::{AuthAvatar, Client, Profile, DEFAULT_QUEUE_CAPACITY};
//! use parlor_transport::{serve_client, PumpConfig};
//!
//! async fn on_connect(conn: impl Connection, room: RoomHandle, profile: Profile) {
//!     let client = Client::new(profile, DEFAULT_QUEUE_CAPACITY);
//!     let summary = serve_client(conn, client, &room, &AuthAvatar, PumpConfig::default()).await;
//! }
//! ```

pub mod memory;
pub mod pump;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use pump::{message_frame, serve_client, EndReason, Identity, PumpConfig, SessionSummary};
pub use traits::{Connection, FrameReader, FrameWriter, Incoming, TransportError};

#[cfg(feature = "websocket")]
pub use websocket::WebSocketConnection;
