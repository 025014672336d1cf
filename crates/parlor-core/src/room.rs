//! The room hub.
//!
//! A [`Room`] is an actor: one task owns the membership map and processes
//! every join, leave and broadcast from a single FIFO command queue, so the
//! operations are totally ordered and the map never needs a lock. Everything
//! else talks to the room through a cloneable [`RoomHandle`].
//!
//! ```text
//!  inbound pump ──broadcast──┐
//!  acceptor ─────join/leave──┼──▶ command queue ──▶ Room::run ──▶ outbound queues
//!  admin ────stats/shutdown──┘
//! ```

use crate::client::{Client, ClientId, OutboundSender};
use crate::message::Message;
use crate::trace::{self, Tracer};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Default command queue capacity.
pub const DEFAULT_COMMAND_CAPACITY: usize = 1024;

/// Room errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomError {
    /// The room loop has stopped.
    #[error("Room is closed")]
    Closed,

    /// The client's outbound queue was already handed to a room.
    #[error("Client already joined: {0}")]
    AlreadyJoined(ClientId),
}

/// What the room does when a member's outbound queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlowConsumerPolicy {
    /// Evict the member immediately.
    Disconnect,
    /// Skip this message for that member and keep it registered.
    Drop,
    /// Wait up to `timeout` for space, then evict.
    Block {
        /// Maximum time one delivery may stall the room.
        timeout: Duration,
    },
}

impl Default for SlowConsumerPolicy {
    fn default() -> Self {
        Self::Disconnect
    }
}

/// Room configuration.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Name used in logs.
    pub name: String,
    /// Capacity of the command queue.
    pub command_capacity: usize,
    /// Whether a sender receives its own messages.
    pub echo_to_sender: bool,
    /// Full-queue handling.
    pub slow_consumer: SlowConsumerPolicy,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            name: "lobby".to_string(),
            command_capacity: DEFAULT_COMMAND_CAPACITY,
            echo_to_sender: true,
            slow_consumer: SlowConsumerPolicy::default(),
        }
    }
}

/// Room statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomStats {
    /// Currently registered members.
    pub members: usize,
    /// Broadcasts processed.
    pub messages_forwarded: u64,
    /// Messages placed on member queues.
    pub deliveries: u64,
    /// Deliveries skipped under [`SlowConsumerPolicy::Drop`].
    pub dropped: u64,
    /// Members removed for being too slow.
    pub evicted: u64,
}

enum Command {
    Join {
        id: ClientId,
        name: String,
        sender: OutboundSender,
    },
    Leave(ClientId),
    Forward(Arc<Message>),
    Stats(oneshot::Sender<RoomStats>),
    Shutdown,
}

struct Member {
    name: String,
    sender: OutboundSender,
}

enum Delivery {
    Sent,
    Dropped,
    Evict,
    Gone,
}

/// The room loop state. Owned by exactly one task.
pub struct Room {
    config: RoomConfig,
    members: HashMap<ClientId, Member>,
    commands: mpsc::Receiver<Command>,
    tracer: Arc<dyn Tracer>,
    stats: RoomStats,
}

impl Room {
    /// Create a room and the handle used to reach it.
    ///
    /// The room does nothing until [`Room::run`] is polled.
    #[must_use]
    pub fn new(config: RoomConfig) -> (Self, RoomHandle) {
        let (tx, rx) = mpsc::channel(config.command_capacity.max(1));
        let handle = RoomHandle {
            commands: tx,
            name: Arc::from(config.name.as_str()),
        };
        let room = Self {
            config,
            members: HashMap::new(),
            commands: rx,
            tracer: trace::off(),
            stats: RoomStats::default(),
        };
        (room, handle)
    }

    /// Replace the tracer.
    #[must_use]
    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    /// Create a room and spawn its loop on the current runtime.
    #[must_use]
    pub fn spawn(
        config: RoomConfig,
        tracer: Arc<dyn Tracer>,
    ) -> (RoomHandle, JoinHandle<RoomStats>) {
        let (room, handle) = Self::new(config);
        let task = tokio::spawn(room.with_tracer(tracer).run());
        (handle, task)
    }

    /// Run the coordination loop until shutdown or until every handle is gone.
    ///
    /// Returns the final statistics.
    pub async fn run(mut self) -> RoomStats {
        info!(room = %self.config.name, policy = ?self.config.slow_consumer, "Room started");

        while let Some(command) = self.commands.recv().await {
            if let Command::Shutdown = command {
                self.drain().await;
                break;
            }
            self.handle(command).await;
        }

        self.close_all();
        info!(
            room = %self.config.name,
            forwarded = self.stats.messages_forwarded,
            "Room stopped"
        );
        self.snapshot()
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Join { id, name, sender } => self.join(id, name, sender),
            Command::Leave(id) => {
                if self.remove(id) {
                    debug!(room = %self.config.name, client = %id, members = self.members.len(), "Client left");
                }
            }
            Command::Forward(message) => self.forward(message).await,
            Command::Stats(reply) => {
                let _ = reply.send(self.snapshot());
            }
            Command::Shutdown => {}
        }
    }

    fn join(&mut self, id: ClientId, name: String, sender: OutboundSender) {
        if self.members.insert(id, Member { name, sender }).is_some() {
            warn!(room = %self.config.name, client = %id, "Client joined twice, replacing queue");
        }
        self.tracer.trace(format_args!("New client joined"));
        debug!(room = %self.config.name, client = %id, members = self.members.len(), "Client joined");
    }

    /// Remove a member, closing its outbound queue.
    fn remove(&mut self, id: ClientId) -> bool {
        match self.members.remove(&id) {
            Some(member) => {
                drop(member.sender);
                self.tracer.trace(format_args!("Client left."));
                true
            }
            None => false,
        }
    }

    async fn forward(&mut self, message: Arc<Message>) {
        self.tracer
            .trace(format_args!("Message received: {}", message.body));
        self.stats.messages_forwarded += 1;

        let policy = self.config.slow_consumer;
        let mut evicted = Vec::new();
        let mut gone = Vec::new();

        for (id, member) in &self.members {
            if !self.config.echo_to_sender && message.is_from(*id) {
                continue;
            }

            match deliver(&member.sender, Arc::clone(&message), policy).await {
                Delivery::Sent => {
                    self.stats.deliveries += 1;
                    self.tracer.trace(format_args!(" -- sent to client"));
                }
                Delivery::Dropped => {
                    self.stats.dropped += 1;
                    warn!(room = %self.config.name, client = %id, name = %member.name, "Queue full, message dropped");
                }
                Delivery::Evict => evicted.push(*id),
                Delivery::Gone => gone.push(*id),
            }
        }

        for id in evicted {
            warn!(room = %self.config.name, client = %id, "Queue full, evicting slow client");
            self.stats.evicted += 1;
            self.remove(id);
        }
        for id in gone {
            debug!(room = %self.config.name, client = %id, "Outbound queue gone, removing client");
            self.remove(id);
        }

        trace!(room = %self.config.name, id = message.id, "Broadcast complete");
    }

    /// Process whatever is already queued, refusing new joins.
    async fn drain(&mut self) {
        info!(room = %self.config.name, "Room shutting down, draining queued commands");
        self.commands.close();

        while let Some(command) = self.commands.recv().await {
            match command {
                Command::Join { id, .. } => {
                    debug!(room = %self.config.name, client = %id, "Join refused during shutdown");
                }
                other => self.handle(other).await,
            }
        }
    }

    fn close_all(&mut self) {
        let ids: Vec<ClientId> = self.members.keys().copied().collect();
        for id in ids {
            self.remove(id);
        }
    }

    fn snapshot(&self) -> RoomStats {
        RoomStats {
            members: self.members.len(),
            ..self.stats.clone()
        }
    }
}

async fn deliver(
    sender: &OutboundSender,
    message: Arc<Message>,
    policy: SlowConsumerPolicy,
) -> Delivery {
    match policy {
        SlowConsumerPolicy::Disconnect | SlowConsumerPolicy::Drop => {
            match sender.try_send(message) {
                Ok(()) => Delivery::Sent,
                Err(TrySendError::Full(_)) if policy == SlowConsumerPolicy::Drop => {
                    Delivery::Dropped
                }
                Err(TrySendError::Full(_)) => Delivery::Evict,
                Err(TrySendError::Closed(_)) => Delivery::Gone,
            }
        }
        SlowConsumerPolicy::Block { timeout } => match sender.send_timeout(message, timeout).await {
            Ok(()) => Delivery::Sent,
            Err(SendTimeoutError::Timeout(_)) => Delivery::Evict,
            Err(SendTimeoutError::Closed(_)) => Delivery::Gone,
        },
    }
}

/// Cloneable handle to a running room.
#[derive(Clone)]
pub struct RoomHandle {
    commands: mpsc::Sender<Command>,
    name: Arc<str>,
}

impl RoomHandle {
    /// The room name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the room loop has stopped accepting commands.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Register a client.
    ///
    /// The returned [`Membership`] leaves the room when dropped.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::AlreadyJoined`] if the client was registered
    /// before, or [`RoomError::Closed`] if the room has stopped.
    pub async fn join(&self, client: &mut Client) -> Result<Membership, RoomError> {
        let id = client.id();
        let sender = client.take_sender().ok_or(RoomError::AlreadyJoined(id))?;
        let command = Command::Join {
            id,
            name: client.name().to_string(),
            sender,
        };
        self.send(command).await?;

        Ok(Membership {
            id,
            commands: self.commands.clone(),
            active: true,
        })
    }

    /// Remove a client. Removing an absent client is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::Closed`] if the room has stopped.
    pub async fn leave(&self, id: ClientId) -> Result<(), RoomError> {
        self.send(Command::Leave(id)).await
    }

    /// Queue a message for fan-out to every member.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::Closed`] if the room has stopped.
    pub async fn broadcast(&self, message: Message) -> Result<(), RoomError> {
        self.send(Command::Forward(Arc::new(message))).await
    }

    /// Fetch current statistics.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::Closed`] if the room has stopped.
    pub async fn stats(&self) -> Result<RoomStats, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Stats(tx)).await?;
        rx.await.map_err(|_| RoomError::Closed)
    }

    /// Ask the room to drain queued commands and stop.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::Closed`] if the room has already stopped.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.send(Command::Shutdown).await
    }

    async fn send(&self, command: Command) -> Result<(), RoomError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| RoomError::Closed)
    }
}

/// A client's registration in a room.
///
/// Leaves the room exactly once: explicitly through [`Membership::leave`], or
/// on drop.
pub struct Membership {
    id: ClientId,
    commands: mpsc::Sender<Command>,
    active: bool,
}

impl Membership {
    /// The registered client.
    #[must_use]
    pub fn client_id(&self) -> ClientId {
        self.id
    }

    /// Leave the room and wait until the request is queued.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::Closed`] if the room has stopped.
    pub async fn leave(mut self) -> Result<(), RoomError> {
        self.active = false;
        self.commands
            .send(Command::Leave(self.id))
            .await
            .map_err(|_| RoomError::Closed)
    }
}

impl Drop for Membership {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        match self.commands.try_send(Command::Leave(self.id)) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(command)) => {
                // Queue is busy; finish the leave in the background.
                match tokio::runtime::Handle::try_current() {
                    Ok(runtime) => {
                        let commands = self.commands.clone();
                        runtime.spawn(async move {
                            let _ = commands.send(command).await;
                        });
                    }
                    Err(_) => {
                        warn!(client = %self.id, "Room queue full and no runtime, leave lost");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Profile;
    use crate::trace::MemoryTracer;
    use tokio::sync::mpsc::error::TryRecvError;

    fn client(name: &str, capacity: usize) -> Client {
        Client::new(Profile::new().with("name", name), capacity)
    }

    fn spawn_room(config: RoomConfig) -> (RoomHandle, JoinHandle<RoomStats>) {
        Room::spawn(config, trace::off())
    }

    fn from(client: &Client, body: &str) -> Message {
        Message::new(client.name(), body).with_source(client.id())
    }

    #[tokio::test]
    async fn test_join_then_broadcast_delivers_once() {
        let (room, _task) = spawn_room(RoomConfig::default());
        let mut a = client("alice", 8);
        let _m = room.join(&mut a).await.unwrap();

        room.broadcast(Message::new("server", "one")).await.unwrap();
        room.broadcast(Message::new("server", "two")).await.unwrap();
        room.stats().await.unwrap();

        assert_eq!(a.outbound().try_recv().unwrap().body, "one");
        assert_eq!(a.outbound().try_recv().unwrap().body, "two");
        assert_eq!(a.outbound().try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[tokio::test]
    async fn test_leave_removes_and_closes_queue() {
        let (room, _task) = spawn_room(RoomConfig::default());
        let mut a = client("alice", 8);
        let mut b = client("bob", 8);
        let _ma = room.join(&mut a).await.unwrap();
        let mb = room.join(&mut b).await.unwrap();

        mb.leave().await.unwrap();
        room.broadcast(Message::new("alice", "after")).await.unwrap();

        let stats = room.stats().await.unwrap();
        assert_eq!(stats.members, 1);
        assert_eq!(stats.deliveries, 1);

        assert_eq!(a.outbound().recv().await.unwrap().body, "after");
        assert!(b.outbound().recv().await.is_none());
    }

    #[tokio::test]
    async fn test_leave_unknown_client_is_noop() {
        let (room, _task) = spawn_room(RoomConfig::default());
        room.leave(ClientId::new(u64::MAX)).await.unwrap();
        room.leave(ClientId::new(u64::MAX)).await.unwrap();
        assert_eq!(room.stats().await.unwrap().members, 0);
    }

    #[tokio::test]
    async fn test_fifo_per_client() {
        let (room, _task) = spawn_room(RoomConfig::default());
        let mut a = client("alice", 128);
        let _m = room.join(&mut a).await.unwrap();

        for i in 0..100 {
            room.broadcast(Message::new("bob", format!("m{i}"))).await.unwrap();
        }

        for i in 0..100 {
            let msg = a.outbound().recv().await.unwrap();
            assert_eq!(msg.body, format!("m{i}"));
        }
    }

    #[tokio::test]
    async fn test_rooms_are_independent() {
        let (first, _t1) = spawn_room(RoomConfig::default());
        let (second, _t2) = spawn_room(RoomConfig::default());
        let mut a = client("alice", 8);
        let mut b = client("bob", 8);
        let _ma = first.join(&mut a).await.unwrap();
        let _mb = second.join(&mut b).await.unwrap();

        first.broadcast(from(&a, "only first")).await.unwrap();
        first.stats().await.unwrap();
        second.stats().await.unwrap();

        assert_eq!(a.outbound().try_recv().unwrap().body, "only first");
        assert_eq!(b.outbound().try_recv().unwrap_err(), TryRecvError::Empty);
        assert_eq!(second.stats().await.unwrap().messages_forwarded, 0);
    }

    #[tokio::test]
    async fn test_scenario_sender_included_by_default() {
        let (room, _task) = spawn_room(RoomConfig::default());
        let mut a = client("A", 8);
        let mut b = client("B", 8);
        let _ma = room.join(&mut a).await.unwrap();
        let _mb = room.join(&mut b).await.unwrap();

        room.broadcast(from(&a, "hi")).await.unwrap();
        room.stats().await.unwrap();

        let got = b.outbound().try_recv().unwrap();
        assert_eq!(got.body, "hi");
        assert_eq!(got.name, "A");
        assert_eq!(b.outbound().try_recv().unwrap_err(), TryRecvError::Empty);

        let echo = a.outbound().try_recv().unwrap();
        assert_eq!(echo.body, "hi");
    }

    #[tokio::test]
    async fn test_scenario_sender_excluded() {
        let config = RoomConfig {
            echo_to_sender: false,
            ..RoomConfig::default()
        };
        let (room, _task) = spawn_room(config);
        let mut a = client("A", 8);
        let mut b = client("B", 8);
        let _ma = room.join(&mut a).await.unwrap();
        let _mb = room.join(&mut b).await.unwrap();

        room.broadcast(from(&a, "hi")).await.unwrap();
        let stats = room.stats().await.unwrap();
        assert_eq!(stats.deliveries, 1);

        let got = b.outbound().try_recv().unwrap();
        assert_eq!((got.name.as_str(), got.body.as_str()), ("A", "hi"));
        assert_eq!(a.outbound().try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[tokio::test]
    async fn test_slow_consumer_disconnected() {
        let (room, _task) = spawn_room(RoomConfig::default());
        let mut slow = client("slow", 1);
        let mut fast = client("fast", 8);
        let _ms = room.join(&mut slow).await.unwrap();
        let _mf = room.join(&mut fast).await.unwrap();

        room.broadcast(Message::new("x", "1")).await.unwrap();
        room.broadcast(Message::new("x", "2")).await.unwrap();
        room.broadcast(Message::new("x", "3")).await.unwrap();

        let stats = room.stats().await.unwrap();
        assert_eq!(stats.evicted, 1);
        assert_eq!(stats.members, 1);

        // The slow client keeps what fit, then sees its queue closed.
        assert_eq!(slow.outbound().recv().await.unwrap().body, "1");
        assert!(slow.outbound().recv().await.is_none());

        for expected in ["1", "2", "3"] {
            assert_eq!(fast.outbound().recv().await.unwrap().body, expected);
        }
    }

    #[tokio::test]
    async fn test_slow_consumer_dropped() {
        let config = RoomConfig {
            slow_consumer: SlowConsumerPolicy::Drop,
            ..RoomConfig::default()
        };
        let (room, _task) = spawn_room(config);
        let mut slow = client("slow", 1);
        let _m = room.join(&mut slow).await.unwrap();

        room.broadcast(Message::new("x", "1")).await.unwrap();
        room.broadcast(Message::new("x", "2")).await.unwrap();

        let stats = room.stats().await.unwrap();
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.evicted, 0);
        assert_eq!(stats.members, 1);

        assert_eq!(slow.outbound().recv().await.unwrap().body, "1");

        // Still registered once there is room again.
        room.broadcast(Message::new("x", "3")).await.unwrap();
        assert_eq!(slow.outbound().recv().await.unwrap().body, "3");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_consumer_blocks_then_evicts() {
        let config = RoomConfig {
            slow_consumer: SlowConsumerPolicy::Block {
                timeout: Duration::from_millis(100),
            },
            ..RoomConfig::default()
        };
        let (room, _task) = spawn_room(config);
        let mut slow = client("slow", 1);
        let _m = room.join(&mut slow).await.unwrap();

        room.broadcast(Message::new("x", "1")).await.unwrap();
        room.broadcast(Message::new("x", "2")).await.unwrap();

        let stats = room.stats().await.unwrap();
        assert_eq!(stats.evicted, 1);
        assert_eq!(stats.members, 0);

        assert_eq!(slow.outbound().recv().await.unwrap().body, "1");
        assert!(slow.outbound().recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_block_policy_waits_for_space() {
        let config = RoomConfig {
            slow_consumer: SlowConsumerPolicy::Block {
                timeout: Duration::from_secs(5),
            },
            ..RoomConfig::default()
        };
        let (room, _task) = spawn_room(config);
        let mut slow = client("slow", 1);
        let _m = room.join(&mut slow).await.unwrap();

        room.broadcast(Message::new("x", "1")).await.unwrap();
        room.broadcast(Message::new("x", "2")).await.unwrap();

        let (_, _, mut outbound) = slow.into_parts();
        let reader = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let mut bodies = Vec::new();
            while bodies.len() < 2 {
                match outbound.recv().await {
                    Some(msg) => bodies.push(msg.body.clone()),
                    None => break,
                }
            }
            bodies
        });

        assert_eq!(reader.await.unwrap(), vec!["1", "2"]);
        let stats = room.stats().await.unwrap();
        assert_eq!(stats.evicted, 0);
        assert_eq!(stats.deliveries, 2);
    }

    #[tokio::test]
    async fn test_departed_receiver_is_removed() {
        let (room, _task) = spawn_room(RoomConfig::default());
        let mut a = client("alice", 8);
        let _m = room.join(&mut a).await.unwrap();
        drop(a);

        room.broadcast(Message::new("x", "anyone?")).await.unwrap();
        let stats = room.stats().await.unwrap();
        assert_eq!(stats.members, 0);
        assert_eq!(stats.evicted, 0);
    }

    #[tokio::test]
    async fn test_join_twice_rejected() {
        let (room, _task) = spawn_room(RoomConfig::default());
        let mut a = client("alice", 8);
        let _m = room.join(&mut a).await.unwrap();

        assert_eq!(
            room.join(&mut a).await.err(),
            Some(RoomError::AlreadyJoined(a.id()))
        );
        assert_eq!(room.stats().await.unwrap().members, 1);
    }

    #[tokio::test]
    async fn test_membership_drop_leaves() {
        let (room, _task) = spawn_room(RoomConfig::default());
        let mut a = client("alice", 8);
        let membership = room.join(&mut a).await.unwrap();
        assert_eq!(membership.client_id(), a.id());
        assert_eq!(room.stats().await.unwrap().members, 1);

        drop(membership);

        assert_eq!(room.stats().await.unwrap().members, 0);
        assert!(a.outbound().recv().await.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_drains_pending_broadcasts() {
        let (room, task) = spawn_room(RoomConfig::default());
        let mut a = client("alice", 8);
        let _m = room.join(&mut a).await.unwrap();

        room.broadcast(Message::new("x", "last words")).await.unwrap();
        room.shutdown().await.unwrap();

        let stats = task.await.unwrap();
        assert_eq!(stats.messages_forwarded, 1);
        assert_eq!(stats.members, 0);

        assert_eq!(a.outbound().recv().await.unwrap().body, "last words");
        assert!(a.outbound().recv().await.is_none());

        assert!(room.is_closed());
        let mut late = client("late", 8);
        assert_eq!(room.join(&mut late).await.err(), Some(RoomError::Closed));
        assert_eq!(
            room.broadcast(Message::new("x", "gone")).await,
            Err(RoomError::Closed)
        );
    }

    #[tokio::test]
    async fn test_room_stops_when_handles_dropped() {
        let (room, task) = spawn_room(RoomConfig::default());
        room.broadcast(Message::new("x", "nobody")).await.unwrap();
        drop(room);

        let stats = task.await.unwrap();
        assert_eq!(stats.messages_forwarded, 1);
        assert_eq!(stats.deliveries, 0);
    }

    #[tokio::test]
    async fn test_trace_events() {
        let tracer = Arc::new(MemoryTracer::new());
        let (room, _task) = Room::spawn(RoomConfig::default(), tracer.clone());
        let mut a = client("alice", 8);
        let membership = room.join(&mut a).await.unwrap();

        room.broadcast(Message::new("alice", "hello")).await.unwrap();
        membership.leave().await.unwrap();
        room.stats().await.unwrap();

        assert_eq!(
            tracer.lines(),
            vec![
                "New client joined",
                "Message received: hello",
                " -- sent to client",
                "Client left.",
            ]
        );
    }

    #[test]
    fn test_drop_outside_runtime_with_full_queue() {
        let config = RoomConfig {
            command_capacity: 1,
            ..RoomConfig::default()
        };
        let (mut room, handle) = Room::new(config);
        let mut a = client("alice", 1);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        // The join fills the only queue slot; the loop never runs.
        let membership = runtime.block_on(handle.join(&mut a)).unwrap();

        // No runtime is current here, so the leave cannot be deferred.
        drop(membership);

        assert!(matches!(room.commands.try_recv(), Ok(Command::Join { .. })));
        assert!(room.commands.try_recv().is_err());
    }
}
