//! Server configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use stagelink_protocol::{DEFAULT_PORT, MAX_FRAME_SIZE};

use crate::connection::DEFAULT_WRITE_TIMEOUT;
use crate::error::{ServerError, ServerResult};

/// Lowest port an operator may choose.
pub const MIN_PORT: u16 = 1000;

/// Highest port an operator may choose.
pub const MAX_PORT: u16 = 65535;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to.
    pub bind_address: IpAddr,

    /// Port used when `start` is called without one.
    pub port: u16,

    /// Size of the per-read socket buffer.
    pub read_buffer_size: usize,

    /// Largest accepted frame.
    pub max_frame_size: usize,

    /// How long one write to a client may block before the client is
    /// dropped.
    pub write_timeout: Duration,

    /// How long `stop` waits for sessions to wind down.
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            read_buffer_size: 1024,
            max_frame_size: MAX_FRAME_SIZE,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Creates a configuration listening on `port` on all interfaces.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Builder: set the bind address.
    pub fn with_bind_address(mut self, address: IpAddr) -> Self {
        self.bind_address = address;
        self
    }

    /// Builder: set the read buffer size.
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Builder: set the maximum frame size.
    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Builder: set the per-write timeout.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Builder: set the shutdown grace period.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Socket address for the given port on the configured interface.
    pub fn socket_addr(&self, port: u16) -> SocketAddr {
        SocketAddr::new(self.bind_address, port)
    }
}

/// Parses an operator-supplied port.
///
/// Accepts decimal numbers in `MIN_PORT..=MAX_PORT`; anything else is
/// rejected rather than replaced by a default.
pub fn parse_port(value: &str) -> ServerResult<u16> {
    let invalid = || ServerError::InvalidPort {
        value: value.to_string(),
        min: MIN_PORT,
        max: MAX_PORT,
    };

    let port: u16 = value.trim().parse().map_err(|_| invalid())?;
    if port < MIN_PORT {
        return Err(invalid());
    }
    Ok(port)
}
