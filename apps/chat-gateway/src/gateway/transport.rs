//! Frame-level transport seam between a [`Connection`](super::connection::Connection)
//! and the physical duplex stream.
//!
//! The WebSocket adapter lives in `server.rs`; the in-memory pair below backs
//! tests and embedders that bridge other transports.

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,

    #[error("transport failure: {0}")]
    Failed(String),
}

/// Read half of a transport. Owned by the connection's read loop.
#[async_trait]
pub trait FrameReader: Send {
    /// Next inbound frame. `Ok(None)` means the peer closed cleanly.
    async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError>;
}

/// Write half of a transport. Owned by the connection, serialized by its lock.
#[async_trait]
pub trait FrameWriter: Send {
    async fn write_frame(&mut self, frame: String) -> Result<(), TransportError>;

    /// Release the transport. Further writes fail.
    async fn close(&mut self) -> Result<(), TransportError>;
}

pub mod memory {
    //! Channel-backed transport pair.

    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::{FrameReader, FrameWriter, TransportError};

    /// Create a connected transport: the reader/writer go to the server side,
    /// the [`MemoryPeer`] plays the client.
    pub fn pair() -> (MemoryReader, MemoryWriter, MemoryPeer) {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        (
            MemoryReader { inbound: in_rx },
            MemoryWriter {
                outbound: Some(out_tx),
            },
            MemoryPeer {
                inbound: Some(in_tx),
                outbound: out_rx,
            },
        )
    }

    pub struct MemoryReader {
        inbound: mpsc::UnboundedReceiver<Result<Vec<u8>, TransportError>>,
    }

    #[async_trait]
    impl FrameReader for MemoryReader {
        async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
            match self.inbound.recv().await {
                Some(Ok(frame)) => Ok(Some(frame)),
                Some(Err(err)) => Err(err),
                None => Ok(None),
            }
        }
    }

    pub struct MemoryWriter {
        outbound: Option<mpsc::UnboundedSender<String>>,
    }

    #[async_trait]
    impl FrameWriter for MemoryWriter {
        async fn write_frame(&mut self, frame: String) -> Result<(), TransportError> {
            let outbound = self.outbound.as_ref().ok_or(TransportError::Closed)?;
            outbound.send(frame).map_err(|_| TransportError::Closed)
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            self.outbound = None;
            Ok(())
        }
    }

    /// Client end of an in-memory transport.
    pub struct MemoryPeer {
        inbound: Option<mpsc::UnboundedSender<Result<Vec<u8>, TransportError>>>,
        outbound: mpsc::UnboundedReceiver<String>,
    }

    impl MemoryPeer {
        /// Send a frame to the server. Returns `false` once the server side is gone.
        pub fn send(&self, frame: impl Into<String>) -> bool {
            match &self.inbound {
                Some(tx) => tx.send(Ok(frame.into().into_bytes())).is_ok(),
                None => false,
            }
        }

        /// Inject a transport failure into the server's read loop.
        pub fn fail(&self, reason: &str) {
            if let Some(tx) = &self.inbound {
                let _ = tx.send(Err(TransportError::Failed(reason.to_string())));
            }
        }

        /// Hang up: the server's read loop sees a clean close.
        pub fn hang_up(&mut self) {
            self.inbound = None;
        }

        /// Wait up to `timeout` for the next frame from the server.
        pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<String> {
            tokio::time::timeout(timeout, self.outbound.recv())
                .await
                .ok()
                .flatten()
        }

        /// Next frame already written by the server, if any.
        pub fn try_recv(&mut self) -> Option<String> {
            self.outbound.try_recv().ok()
        }
    }
}
