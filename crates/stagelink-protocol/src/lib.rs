//! Framing and message types for the stagelink control protocol.
//!
//! # Protocol Overview
//!
//! Clients talk to the server over plain TCP. Each message is a UTF-8 JSON
//! object terminated by a single `^` byte (see [`framing`](crate::encode_frame)).
//!
//! # Envelope Structure
//!
//! Every message is an [`Envelope`]:
//! - `type`: selects the payload shape (`control-device`, `control-success`,
//!   `error`, `device-selected`, `info`)
//! - `payload`: type-specific JSON, absent for plain errors and notices
//! - `message`: optional human readable text
//!
//! # Example
//!
//! ```rust
//! use stagelink_protocol::{Command, Envelope, FrameDecoder, encode_frame};
//!
//! let request = Envelope::control_device("4711", true).unwrap();
//! let frame = encode_frame(&request).unwrap();
//!
//! let mut decoder = FrameDecoder::new();
//! let frames = decoder.decode(&frame);
//! let decoded: Envelope = serde_json::from_str(frames[0].as_ref().unwrap()).unwrap();
//! assert!(matches!(Command::from_envelope(&decoded), Ok(Command::ControlDevice { .. })));
//! ```

mod error;
mod framing;
mod types;

pub use error::{CommandError, ProtocolError, ProtocolResult};
pub use framing::{DELIMITER, FrameDecoder, encode_frame, split_frames};
pub use types::{
    Command, DeviceSelected, DeviceStateRequest, DeviceStateResponse, Envelope, message_type,
};

/// Default TCP port of the control server.
pub const DEFAULT_PORT: u16 = 13377;

/// Maximum size of a single frame (1 MiB).
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;
