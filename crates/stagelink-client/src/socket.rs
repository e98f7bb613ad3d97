//! TCP client for talking to a stagelink server.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use stagelink_protocol::{Envelope, FrameDecoder, encode_frame, message_type};

use crate::error::{ClientError, ClientResult};

/// Client for a stagelink control server.
#[derive(Debug, Clone)]
pub struct ControlClient {
    address: String,
    timeout: Duration,
}

impl ControlClient {
    /// Creates a client for `address` (`host:port`).
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }

    /// Returns the server address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Opens a connection to the server.
    pub async fn connect(&self) -> ClientResult<TcpStream> {
        debug!(address = %self.address, "connecting to server");
        tokio::time::timeout(self.timeout, TcpStream::connect(&self.address))
            .await
            .map_err(|_| {
                ClientError::Connection(format!(
                    "connection to {} timed out after {}s",
                    self.address,
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                ClientError::Connection(format!("failed to connect to {}: {}", self.address, e))
            })
    }

    /// Sends one request and waits for its answer.
    ///
    /// Broadcasts that arrive first are skipped; the answer is the first
    /// `control-success` or `error` envelope.
    pub async fn request(&self, request: &Envelope) -> ClientResult<Envelope> {
        let mut stream = self.connect().await?;
        let frame = encode_frame(request)?;

        tokio::time::timeout(self.timeout, stream.write_all(&frame))
            .await
            .map_err(|_| ClientError::Timeout("sending request".into()))??;

        debug!(request_type = %request.kind, "request sent, waiting for response");

        tokio::time::timeout(self.timeout, read_response(&mut stream))
            .await
            .map_err(|_| ClientError::Timeout("reading response".into()))?
    }

    /// Asks the server to switch `device_id` on or off.
    pub async fn control_device(&self, device_id: &str, on: bool) -> ClientResult<Envelope> {
        self.request(&Envelope::control_device(device_id, on)?).await
    }

    /// Calls `on_frame` for every frame the server sends until it closes.
    pub async fn listen<F>(&self, mut on_frame: F) -> ClientResult<()>
    where
        F: FnMut(&str),
    {
        let mut stream = self.connect().await?;
        let mut decoder = FrameDecoder::new();
        let mut buf = [0u8; 1024];

        loop {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                debug!("server closed the connection");
                return Ok(());
            }
            for frame in decoder.decode(&buf[..n]) {
                match frame {
                    Ok(text) if !text.trim().is_empty() => on_frame(&text),
                    Ok(_) => {}
                    Err(e) => debug!(error = %e, "dropping frame"),
                }
            }
        }
    }
}

async fn read_response(stream: &mut TcpStream) -> ClientResult<Envelope> {
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; 1024];

    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Err(ClientError::Connection(
                "server closed the connection before answering".into(),
            ));
        }
        for frame in decoder.decode(&buf[..n]) {
            let envelope = Envelope::from_frame(&frame?)?;
            if envelope.is(message_type::CONTROL_SUCCESS) || envelope.is(message_type::ERROR) {
                return Ok(envelope);
            }
            debug!(request_type = %envelope.kind, "skipping broadcast");
        }
    }
}
