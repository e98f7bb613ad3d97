//! Protocol error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while framing or decoding messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A frame grew past the size limit before its delimiter arrived.
    #[error("frame too large: more than {max} bytes without a delimiter")]
    FrameTooLarge { max: usize },

    /// A complete frame is not valid UTF-8.
    #[error("frame is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// Failed to serialize or deserialize JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A frame does not start with a JSON object.
    #[error("not a command message")]
    NotAnObject,
}

/// Reasons a known command's payload is rejected.
///
/// The display strings are sent verbatim to clients in `error` envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Payload missing or not of the expected shape.
    #[error("Invalid request payload")]
    InvalidPayload,

    /// Payload parsed but carries no device identifier.
    #[error("EntityId is null")]
    MissingDeviceId,
}
