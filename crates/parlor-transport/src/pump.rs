//! Client connection pumps.
//!
//! Each connected client runs two pumps:
//!
//! - the **inbound pump** reads frames from the transport and submits them
//!   to the room as broadcasts;
//! - the **outbound pump** drains the client's queue onto the transport and
//!   keeps the connection alive with pings.
//!
//! [`serve_client`] wires them together and guarantees the client leaves the
//! room exactly once, whichever pump stops first.

use parlor_core::client::OutboundReceiver;
use parlor_core::{Avatar, Client, ClientId, Message, RoomError, RoomHandle};
use parlor_protocol::codec::ProtocolError;
use parlor_protocol::frames::{ERROR_FRAME_TOO_LARGE, ERROR_INVALID_FRAME};
use parlor_protocol::{ClientFrame, FrameCodec, ServerFrame};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, timeout, Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::traits::{Connection, FrameReader, FrameWriter, Incoming, TransportError};

/// Pending error notices per client.
const NOTICE_CAPACITY: usize = 8;

/// Pump timing and encoding.
#[derive(Debug, Clone)]
pub struct PumpConfig {
    /// Codec for both directions.
    pub codec: FrameCodec,
    /// Maximum time one transport write may take.
    pub write_timeout: Duration,
    /// Disconnect after this long without any inbound traffic.
    pub idle_timeout: Option<Duration>,
    /// Interval between keepalive pings.
    pub ping_interval: Option<Duration>,
    /// Time the outbound pump gets to flush after the inbound side ends.
    pub close_grace: Duration,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            codec: FrameCodec::default(),
            write_timeout: Duration::from_secs(10),
            idle_timeout: Some(Duration::from_secs(60)),
            ping_interval: Some(Duration::from_secs(30)),
            close_grace: Duration::from_secs(5),
        }
    }
}

/// Why a client session ended.
#[derive(Debug)]
pub enum EndReason {
    /// The peer closed the connection.
    PeerClosed,
    /// No inbound traffic within the idle timeout.
    Idle,
    /// A transport read or write failed.
    Transport(TransportError),
    /// A write did not complete within the write timeout.
    WriteTimeout,
    /// The room closed this client's queue (left, evicted or shut down).
    Removed,
    /// The room stopped accepting broadcasts.
    RoomClosed,
    /// The outbound pump task panicked or was cancelled.
    Aborted,
}

impl EndReason {
    /// Short label for logs and metrics.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EndReason::PeerClosed => "peer_closed",
            EndReason::Idle => "idle",
            EndReason::Transport(_) => "transport",
            EndReason::WriteTimeout => "write_timeout",
            EndReason::Removed => "removed",
            EndReason::RoomClosed => "room_closed",
            EndReason::Aborted => "aborted",
        }
    }
}

/// Outcome of [`serve_client`].
#[derive(Debug)]
pub struct SessionSummary {
    /// The client that was served.
    pub client: ClientId,
    /// What ended the session first.
    pub reason: EndReason,
    /// Chat frames accepted from the peer.
    pub received: u64,
    /// Frames written to the peer.
    pub sent: u64,
}

#[derive(Debug, Default)]
struct Counters {
    received: AtomicU64,
    sent: AtomicU64,
}

/// Sender details stamped on every message a client produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// The sending client.
    pub client: ClientId,
    /// Display name.
    pub name: String,
    /// Avatar URL, if one could be resolved.
    pub avatar_url: Option<String>,
}

impl Identity {
    /// Resolve a client's name and avatar once, at connection time.
    #[must_use]
    pub fn resolve(client: &Client, avatar: &dyn Avatar) -> Self {
        let avatar_url = match avatar.avatar_url(client.profile()) {
            Ok(url) => Some(url),
            Err(e) => {
                debug!(client = %client.id(), error = %e, "No avatar, using default");
                None
            }
        };
        Self {
            client: client.id(),
            name: client.name().to_string(),
            avatar_url,
        }
    }

    /// Build a message from this sender.
    #[must_use]
    pub fn message(&self, body: impl Into<String>) -> Message {
        let message = Message::new(self.name.clone(), body).with_source(self.client);
        match &self.avatar_url {
            Some(url) => message.with_avatar_url(url.clone()),
            None => message,
        }
    }
}

/// The wire frame for a room message.
#[must_use]
pub fn message_frame(message: &Message) -> ServerFrame {
    ServerFrame::Message {
        name: message.name.clone(),
        message: message.body.clone(),
        when: message.timestamp,
        avatar_url: message.avatar_url.clone(),
    }
}

enum Finished {
    Inbound(EndReason),
    Outbound(Result<EndReason, tokio::task::JoinError>),
}

/// Serve one client until its connection or its membership ends.
///
/// Joins `room`, runs the outbound pump on its own task and the inbound pump
/// on the caller's. The client leaves the room exactly once before this
/// returns; if this future is dropped early, the membership guard leaves on
/// drop.
///
/// # Errors
///
/// Returns [`RoomError`] if the client could not join.
pub async fn serve_client<C: Connection>(
    connection: C,
    mut client: Client,
    room: &RoomHandle,
    avatar: &dyn Avatar,
    config: PumpConfig,
) -> Result<SessionSummary, RoomError> {
    let identity = Identity::resolve(&client, avatar);
    let remote = connection.remote_addr();
    let membership = room.join(&mut client).await?;
    let (id, _, outbound) = client.into_parts();

    debug!(client = %id, name = %identity.name, remote = ?remote, "Client session started");

    let (reader, writer) = connection.split();
    let (notice_tx, notice_rx) = mpsc::channel(NOTICE_CAPACITY);
    let counters = Arc::new(Counters::default());

    let mut write_task = tokio::spawn(write_pump(
        writer,
        outbound,
        notice_rx,
        config.clone(),
        Arc::clone(&counters),
    ));

    let finished = {
        let read = read_pump(reader, room, &identity, notice_tx, &config, &counters);
        tokio::pin!(read);
        tokio::select! {
            reason = &mut read => Finished::Inbound(reason),
            joined = &mut write_task => Finished::Outbound(joined),
        }
    };

    if let Err(e) = membership.leave().await {
        debug!(client = %id, error = %e, "Room already closed on leave");
    }

    let reason = match finished {
        Finished::Inbound(reason) => {
            // Leaving closed the queue; let the outbound pump flush and close.
            match timeout(config.close_grace, &mut write_task).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!(client = %id, error = %e, "Outbound pump failed"),
                Err(_) => {
                    debug!(client = %id, "Outbound pump did not finish in time, aborting");
                    write_task.abort();
                }
            }
            reason
        }
        Finished::Outbound(Ok(reason)) => reason,
        Finished::Outbound(Err(e)) => {
            warn!(client = %id, error = %e, "Outbound pump failed");
            EndReason::Aborted
        }
    };

    let summary = SessionSummary {
        client: id,
        reason,
        received: counters.received.load(Ordering::Relaxed),
        sent: counters.sent.load(Ordering::Relaxed),
    };
    debug!(
        client = %id,
        reason = ?summary.reason,
        received = summary.received,
        sent = summary.sent,
        "Client session ended"
    );
    Ok(summary)
}

async fn read_pump<R: FrameReader>(
    mut reader: R,
    room: &RoomHandle,
    identity: &Identity,
    notices: mpsc::Sender<ServerFrame>,
    config: &PumpConfig,
    counters: &Counters,
) -> EndReason {
    loop {
        let next = match config.idle_timeout {
            Some(limit) => match timeout(limit, reader.recv()).await {
                Ok(next) => next,
                Err(_) => {
                    debug!(client = %identity.client, "Idle timeout");
                    return EndReason::Idle;
                }
            },
            None => reader.recv().await,
        };

        let wire = match next {
            Ok(Some(Incoming::Frame(wire))) => wire,
            Ok(Some(Incoming::Heartbeat)) => continue,
            Ok(None) => return EndReason::PeerClosed,
            Err(e) => {
                warn!(client = %identity.client, error = %e, "Read failed");
                return EndReason::Transport(e);
            }
        };

        match config.codec.decode::<ClientFrame>(&wire) {
            Ok(frame) => {
                counters.received.fetch_add(1, Ordering::Relaxed);
                if room.broadcast(identity.message(frame.message)).await.is_err() {
                    return EndReason::RoomClosed;
                }
            }
            Err(e) => {
                warn!(client = %identity.client, error = %e, "Rejected inbound frame");
                let code = match e {
                    ProtocolError::FrameTooLarge { .. } => ERROR_FRAME_TOO_LARGE,
                    _ => ERROR_INVALID_FRAME,
                };
                // Best effort: a client flooding bad frames loses notices.
                let _ = notices.try_send(ServerFrame::error(code, e.to_string()));
            }
        }
    }
}

async fn write_pump<W: FrameWriter>(
    mut writer: W,
    mut outbound: OutboundReceiver,
    mut notices: mpsc::Receiver<ServerFrame>,
    config: PumpConfig,
    counters: Arc<Counters>,
) -> EndReason {
    let mut heartbeat = config.ping_interval.map(|period| {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    let reason = loop {
        tokio::select! {
            biased;

            message = outbound.recv() => match message {
                Some(message) => {
                    if let Err(reason) = write_frame(&mut writer, &message_frame(&message), &config).await {
                        break reason;
                    }
                    counters.sent.fetch_add(1, Ordering::Relaxed);
                }
                None => break EndReason::Removed,
            },

            Some(notice) = notices.recv() => {
                if let Err(reason) = write_frame(&mut writer, &notice, &config).await {
                    break reason;
                }
                counters.sent.fetch_add(1, Ordering::Relaxed);
            }

            _ = tick(&mut heartbeat) => {
                match timeout(config.write_timeout, writer.ping()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => break EndReason::Transport(e),
                    Err(_) => break EndReason::WriteTimeout,
                }
            }
        }
    };

    if let EndReason::Removed = reason {
        match timeout(config.write_timeout, writer.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "Close frame not delivered"),
            Err(_) => debug!("Close frame timed out"),
        }
    }
    reason
}

async fn write_frame<W: FrameWriter>(
    writer: &mut W,
    frame: &ServerFrame,
    config: &PumpConfig,
) -> Result<(), EndReason> {
    let wire = match config.codec.encode(frame) {
        Ok(wire) => wire,
        Err(e) => {
            warn!(error = %e, kind = frame.kind(), "Dropping unencodable frame");
            return Ok(());
        }
    };

    match timeout(config.write_timeout, writer.send(wire)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(EndReason::Transport(e)),
        Err(_) => Err(EndReason::WriteTimeout),
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
