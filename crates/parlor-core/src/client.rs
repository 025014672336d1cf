//! Connected participants.
//!
//! A [`Client`] owns the receiving end of its outbound queue. The sending end
//! is handed to the room exactly once, when the client joins; from then on the
//! room is the only producer and the client's outbound pump the only consumer.

use crate::message::Message;
use crate::profile::Profile;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Default outbound queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    /// Wrap a raw id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocate a fresh, process-unique id.
    #[must_use]
    pub fn generate() -> Self {
        Self(NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Sending half of a client's outbound queue.
pub type OutboundSender = mpsc::Sender<Arc<Message>>;

/// Receiving half of a client's outbound queue.
pub type OutboundReceiver = mpsc::Receiver<Arc<Message>>;

/// One connected participant.
#[derive(Debug)]
pub struct Client {
    id: ClientId,
    profile: Profile,
    outbound: OutboundReceiver,
    sender: Option<OutboundSender>,
}

impl Client {
    /// Create a client with an outbound queue of `capacity` messages.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(profile: Profile, capacity: usize) -> Self {
        let (sender, outbound) = mpsc::channel(capacity);
        Self {
            id: ClientId::generate(),
            profile,
            outbound,
            sender: Some(sender),
        }
    }

    /// The client id.
    #[must_use]
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// The client's profile.
    #[must_use]
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Display name used on outgoing messages.
    #[must_use]
    pub fn name(&self) -> &str {
        self.profile.display_name()
    }

    /// Whether the sending half has already been handed to a room.
    #[must_use]
    pub fn has_joined(&self) -> bool {
        self.sender.is_none()
    }

    /// Take the sending half. Returns `None` after the first call.
    pub(crate) fn take_sender(&mut self) -> Option<OutboundSender> {
        self.sender.take()
    }

    /// Mutable access to the outbound queue.
    pub fn outbound(&mut self) -> &mut OutboundReceiver {
        &mut self.outbound
    }

    /// Split into id, profile and outbound queue.
    #[must_use]
    pub fn into_parts(self) -> (ClientId, Profile, OutboundReceiver) {
        (self.id, self.profile, self.outbound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_id_generation() {
        let id1 = ClientId::generate();
        let id2 = ClientId::generate();
        assert_ne!(id1, id2);
        assert!(id1.to_string().starts_with("client-"));
    }

    #[test]
    fn test_client_sender_taken_once() {
        let mut client = Client::new(Profile::new().with("name", "Ada"), 4);
        assert_eq!(client.name(), "Ada");
        assert!(!client.has_joined());

        assert!(client.take_sender().is_some());
        assert!(client.has_joined());
        assert!(client.take_sender().is_none());
    }

    #[tokio::test]
    async fn test_outbound_queue_closes_with_sender() {
        let mut client = Client::new(Profile::new(), 4);
        let sender = client.take_sender().unwrap();

        sender.send(Arc::new(Message::new("a", "one"))).await.unwrap();
        drop(sender);

        let msg = client.outbound().recv().await.unwrap();
        assert_eq!(msg.body, "one");
        assert!(client.outbound().recv().await.is_none());
    }
}
