//! Transport abstraction traits for Parlor.
//!
//! A [`Connection`] is split into a [`FrameReader`] and a [`FrameWriter`] so
//! the inbound and outbound pumps can run independently.

use async_trait::async_trait;
use parlor_protocol::WireFrame;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// An operation did not finish in time.
    #[error("Connection timed out")]
    Timeout,

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to receive data.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Protocol error.
    #[error("Protocol error: {0}")]
    Protocol(#[from] parlor_protocol::ProtocolError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Something read from a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// A data frame.
    Frame(WireFrame),
    /// A keepalive (ping or pong); proves the peer is alive.
    Heartbeat,
}

/// The receiving half of a connection.
#[async_trait]
pub trait FrameReader: Send {
    /// Receive the next item.
    ///
    /// Returns `None` if the connection is closed cleanly.
    async fn recv(&mut self) -> Result<Option<Incoming>, TransportError>;
}

/// The sending half of a connection.
#[async_trait]
pub trait FrameWriter: Send {
    /// Send a data frame.
    async fn send(&mut self, frame: WireFrame) -> Result<(), TransportError>;

    /// Send a keepalive ping.
    async fn ping(&mut self) -> Result<(), TransportError>;

    /// Send a close frame and shut the sending half.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// An accepted duplex connection.
pub trait Connection: Send + 'static {
    /// Receiving half.
    type Reader: FrameReader + 'static;
    /// Sending half.
    type Writer: FrameWriter + 'static;

    /// Split into independently owned halves.
    fn split(self) -> (Self::Reader, Self::Writer);

    /// Get the remote address of the connection, if available.
    fn remote_addr(&self) -> Option<String> {
        None
    }
}
