//! Write side of a client connection.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::signals::{ShutdownHandle, ShutdownSignal};

/// Write timeout used when none is configured.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// A registered client connection.
///
/// Owns the write half of the socket. The read half belongs to the session
/// task, which watches [`Connection::closed`] so a close from any task wakes
/// it out of a pending read. Pending writes watch the same signal.
#[derive(Debug)]
pub struct Connection {
    id: Uuid,
    peer: SocketAddr,
    writer: Mutex<Option<OwnedWriteHalf>>,
    write_timeout: Duration,
    closing: AtomicBool,
    closed: ShutdownHandle,
}

impl Connection {
    /// Wraps the write half of an accepted socket.
    pub fn new(peer: SocketAddr, writer: OwnedWriteHalf) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer,
            writer: Mutex::new(Some(writer)),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            closing: AtomicBool::new(false),
            closed: ShutdownHandle::new(),
        }
    }

    /// Builder: set how long one [`send`](Self::send) may block.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Session identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Remote address.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Returns true until [`close`](Self::close) has been called.
    pub fn is_open(&self) -> bool {
        !self.closing.load(Ordering::Acquire)
    }

    /// Signal that completes once the connection is closed.
    pub fn closed(&self) -> ShutdownSignal {
        self.closed.wait()
    }

    /// Writes `bytes` as one unit.
    ///
    /// Concurrent senders are serialized, so two frames never interleave.
    /// The write gives up with `NotConnected` as soon as the connection is
    /// closed, and with `TimedOut` once the write timeout elapses. After a
    /// timeout part of the frame may be on the wire, so the caller must
    /// close the connection.
    pub async fn send(&self, bytes: &[u8]) -> io::Result<()> {
        let write = tokio::time::timeout(self.write_timeout, self.write_locked(bytes));
        tokio::select! {
            biased;
            _ = self.closed.wait().wait() => Err(not_connected()),
            written = write => match written {
                Ok(result) => result,
                Err(_) => {
                    debug!(session_id = %self.id, peer = %self.peer, "Write timed out");
                    Err(io::Error::new(io::ErrorKind::TimedOut, "write timed out"))
                }
            },
        }
    }

    async fn write_locked(&self, bytes: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        match writer.as_mut() {
            Some(stream) if self.is_open() => {
                stream.write_all(bytes).await?;
                stream.flush().await
            }
            _ => Err(not_connected()),
        }
    }

    /// Closes the connection.
    ///
    /// Returns false if it was already closed. A send blocked on a full
    /// socket buffer is cancelled first, so this never waits on the peer.
    pub async fn close(&self) -> bool {
        if self.closing.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.closed.trigger();

        if let Some(mut stream) = self.writer.lock().await.take() {
            // The peer may already be gone.
            let _ = stream.shutdown().await;
        }
        debug!(session_id = %self.id, peer = %self.peer, "Connection closed");
        true
    }
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "connection closed")
}
