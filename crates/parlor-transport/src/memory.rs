//! In-memory transport.
//!
//! [`pair`] returns a server-side [`MemoryConnection`] and the [`MemoryPeer`]
//! playing the remote client. Both directions are bounded, so a peer that
//! stops reading eventually stalls the server's writes, like a real socket.

use async_trait::async_trait;
use parlor_protocol::WireFrame;
use tokio::sync::mpsc;

use crate::traits::{Connection, FrameReader, FrameWriter, Incoming, TransportError};

/// What the server wrote to the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// A data frame.
    Frame(WireFrame),
    /// A keepalive ping.
    Ping,
    /// A close frame.
    Close,
}

type InboundItem = Result<Incoming, TransportError>;

/// Create a connected pair with `capacity` slots in each direction.
///
/// # Panics
///
/// Panics if `capacity` is zero.
#[must_use]
pub fn pair(capacity: usize) -> (MemoryConnection, MemoryPeer) {
    let (to_server, inbound) = mpsc::channel(capacity);
    let (outbound, from_server) = mpsc::channel(capacity);
    (
        MemoryConnection { inbound, outbound },
        MemoryPeer {
            to_server: Some(to_server),
            from_server,
        },
    )
}

/// Server side of an in-memory connection.
pub struct MemoryConnection {
    inbound: mpsc::Receiver<InboundItem>,
    outbound: mpsc::Sender<Outgoing>,
}

impl Connection for MemoryConnection {
    type Reader = MemoryReader;
    type Writer = MemoryWriter;

    fn split(self) -> (Self::Reader, Self::Writer) {
        (
            MemoryReader {
                inbound: self.inbound,
            },
            MemoryWriter {
                outbound: self.outbound,
                closed: false,
            },
        )
    }

    fn remote_addr(&self) -> Option<String> {
        Some("memory".to_string())
    }
}

/// Receiving half of a [`MemoryConnection`].
pub struct MemoryReader {
    inbound: mpsc::Receiver<InboundItem>,
}

#[async_trait]
impl FrameReader for MemoryReader {
    async fn recv(&mut self) -> Result<Option<Incoming>, TransportError> {
        self.inbound.recv().await.transpose()
    }
}

/// Sending half of a [`MemoryConnection`].
pub struct MemoryWriter {
    outbound: mpsc::Sender<Outgoing>,
    closed: bool,
}

impl MemoryWriter {
    async fn push(&mut self, item: Outgoing) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::ConnectionClosed);
        }
        self.outbound
            .send(item)
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }
}

#[async_trait]
impl FrameWriter for MemoryWriter {
    async fn send(&mut self, frame: WireFrame) -> Result<(), TransportError> {
        self.push(Outgoing::Frame(frame)).await
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        self.push(Outgoing::Ping).await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.push(Outgoing::Close).await?;
        self.closed = true;
        Ok(())
    }
}

/// The remote end of an in-memory connection.
pub struct MemoryPeer {
    to_server: Option<mpsc::Sender<InboundItem>>,
    from_server: mpsc::Receiver<Outgoing>,
}

impl MemoryPeer {
    async fn push(&self, item: InboundItem) -> Result<(), TransportError> {
        match &self.to_server {
            Some(tx) => tx
                .send(item)
                .await
                .map_err(|_| TransportError::ConnectionClosed),
            None => Err(TransportError::ConnectionClosed),
        }
    }

    /// Send a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the server side is gone or the peer hung up.
    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), TransportError> {
        self.push(Ok(Incoming::Frame(WireFrame::Text(text.into()))))
            .await
    }

    /// Send any wire frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the server side is gone or the peer hung up.
    pub async fn send_frame(&self, frame: WireFrame) -> Result<(), TransportError> {
        self.push(Ok(Incoming::Frame(frame))).await
    }

    /// Send a keepalive.
    ///
    /// # Errors
    ///
    /// Returns an error if the server side is gone or the peer hung up.
    pub async fn send_heartbeat(&self) -> Result<(), TransportError> {
        self.push(Ok(Incoming::Heartbeat)).await
    }

    /// Make the server's next read fail with `error`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server side is gone or the peer hung up.
    pub async fn fail(&self, error: TransportError) -> Result<(), TransportError> {
        self.push(Err(error)).await
    }

    /// Close the peer's sending side; the server reads end-of-stream.
    pub fn hang_up(&mut self) {
        self.to_server = None;
    }

    /// Next item written by the server, or `None` once the writer is gone.
    pub async fn next(&mut self) -> Option<Outgoing> {
        self.from_server.recv().await
    }

    /// Next data frame, skipping pings. `None` on close or disconnect.
    pub async fn next_frame(&mut self) -> Option<WireFrame> {
        loop {
            match self.from_server.recv().await? {
                Outgoing::Frame(frame) => return Some(frame),
                Outgoing::Ping => continue,
                Outgoing::Close => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_pair_roundtrip() {
        let (conn, mut peer) = pair(4);
        let (mut reader, mut writer) = conn.split();

        peer.send_text("hello").await.unwrap();
        peer.send_heartbeat().await.unwrap();
        assert_eq!(
            reader.recv().await.unwrap(),
            Some(Incoming::Frame(WireFrame::Text("hello".into())))
        );
        assert_eq!(reader.recv().await.unwrap(), Some(Incoming::Heartbeat));

        writer.send(WireFrame::Text("back".into())).await.unwrap();
        writer.ping().await.unwrap();
        writer.close().await.unwrap();
        assert!(writer.ping().await.is_err());

        assert_eq!(peer.next().await, Some(Outgoing::Frame(WireFrame::Text("back".into()))));
        assert_eq!(peer.next().await, Some(Outgoing::Ping));
        assert_eq!(peer.next().await, Some(Outgoing::Close));

        peer.hang_up();
        assert_eq!(reader.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_reader_error() {
        let (conn, peer) = pair(1);
        let (mut reader, _writer) = conn.split();

        peer.fail(TransportError::ReceiveFailed("reset".into()))
            .await
            .unwrap();
        assert!(matches!(
            reader.recv().await,
            Err(TransportError::ReceiveFailed(_))
        ));
    }
}
