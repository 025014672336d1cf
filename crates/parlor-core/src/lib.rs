//! # parlor-core
//!
//! Core types and the room hub for the Parlor broadcast chat server.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **Room** - Single-owner actor holding the membership set and fanning out messages
//! - **Client** - A connected participant and its bounded outbound queue
//! - **Message** - Immutable chat message shared between recipients
//! - **Avatar** - Profile picture resolution with fallbacks
//! - **Tracer** - Injectable diagnostic event sink
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  join/leave  ┌─────────────┐   Arc<Message>   ┌─────────────┐
//! │   Client    │─────────────▶│    Room     │─────────────────▶│  outbound   │
//! │ inbound pump│──broadcast──▶│  (one task) │                  │   queues    │
//! └─────────────┘              └─────────────┘                  └─────────────┘
//!                                     │
//!                                     ▼
//!                              ┌─────────────┐
//!                              │   Tracer    │
//!                              └─────────────┘
//! ```

pub mod avatar;
pub mod client;
pub mod message;
pub mod profile;
pub mod room;
pub mod trace;

pub use avatar::{AuthAvatar, Avatar, AvatarError, GravatarAvatar, TryAvatars};
pub use client::{Client, ClientId, DEFAULT_QUEUE_CAPACITY};
pub use message::Message;
pub use profile::Profile;
pub use room::{Membership, Room, RoomConfig, RoomError, RoomHandle, RoomStats, SlowConsumerPolicy};
pub use trace::Tracer;
