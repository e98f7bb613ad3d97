//! Server error types.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// IO error (socket read/write/accept).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Protocol error (framing, encoding, etc.).
    #[error("Protocol error: {0}")]
    Protocol(#[from] stagelink_protocol::ProtocolError),

    /// Binding the listening socket failed.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Server is already running.
    #[error("Server is already running on {addr}")]
    AlreadyRunning { addr: SocketAddr },

    /// Server is not running.
    #[error("Server is not running")]
    NotRunning,

    /// Operator supplied a port outside the accepted range.
    #[error("Invalid port '{value}': expected a number between {min} and {max}")]
    InvalidPort { value: String, min: u16, max: u16 },

    /// Broadcast requested while no client is connected.
    #[error("No client connected")]
    NoClients,

    /// Target resolver did not yield a device.
    #[error("No device selected")]
    NoTarget,
}

impl ServerError {
    /// Creates a bind error.
    pub fn bind(addr: SocketAddr, source: io::Error) -> Self {
        Self::Bind { addr, source }
    }

    /// Creates an already running error.
    pub fn already_running(addr: SocketAddr) -> Self {
        Self::AlreadyRunning { addr }
    }
}
