//! Chat message type.
//!
//! A message is built once by the inbound pump of the sending client and then
//! shared, behind an `Arc`, with every recipient queue.

use crate::client::ClientId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A unique message identifier.
pub type MessageId = u64;

static ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate a unique message ID.
#[must_use]
pub fn generate_message_id() -> MessageId {
    ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Milliseconds since the unix epoch.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Unique message identifier.
    pub id: MessageId,
    /// Client that sent the message, if any.
    pub source: Option<ClientId>,
    /// Display name of the sender.
    pub name: String,
    /// Message text.
    pub body: String,
    /// Sender avatar, when one could be resolved.
    pub avatar_url: Option<String>,
    /// Creation time in unix milliseconds.
    pub timestamp: u64,
}

impl Message {
    /// Create a new message stamped with the current time.
    #[must_use]
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: generate_message_id(),
            source: None,
            name: name.into(),
            body: body.into(),
            avatar_url: None,
            timestamp: now_millis(),
        }
    }

    /// Set the originating client.
    #[must_use]
    pub fn with_source(mut self, source: ClientId) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the avatar URL.
    #[must_use]
    pub fn with_avatar_url(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }

    /// Whether `client` sent this message.
    #[must_use]
    pub fn is_from(&self, client: ClientId) -> bool {
        self.source == Some(client)
    }
}
