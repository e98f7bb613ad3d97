//! Client error types.

use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection to server failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// Protocol/framing error.
    #[error("protocol error: {0}")]
    Protocol(#[from] stagelink_protocol::ProtocolError),

    /// Server answered but refused or could not apply the request.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Request timed out.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Server lifecycle or broadcast error.
    #[error(transparent)]
    Server(#[from] stagelink_server::ServerError),

    /// Logging could not be initialized.
    #[error(transparent)]
    Tracing(#[from] stagelink_core::TracingError),

    /// Console input that does not form a command.
    #[error("{0}")]
    Usage(String),
}

impl ClientError {
    /// Creates a usage error.
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }
}
