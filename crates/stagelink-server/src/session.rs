//! Per-client read loop.

use std::net::SocketAddr;
use std::sync::Arc;

use stagelink_protocol::{Envelope, FrameDecoder, ProtocolError, encode_frame};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedReadHalf;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::dispatch::CommandDispatcher;
use crate::registry::ConnectionRegistry;

/// One accepted client: reads frames, dispatches requests, writes answers.
pub struct ClientSession {
    connection: Arc<Connection>,
    reader: OwnedReadHalf,
    decoder: FrameDecoder,
    read_buffer_size: usize,
    dispatcher: CommandDispatcher,
    registry: Arc<ConnectionRegistry>,
}

impl ClientSession {
    /// Wraps an accepted stream.
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        config: &ServerConfig,
        dispatcher: CommandDispatcher,
        registry: Arc<ConnectionRegistry>,
    ) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            connection: Arc::new(
                Connection::new(peer, writer).with_write_timeout(config.write_timeout),
            ),
            reader,
            decoder: FrameDecoder::with_max_frame_size(config.max_frame_size),
            read_buffer_size: config.read_buffer_size,
            dispatcher,
            registry,
        }
    }

    /// The connection this session owns.
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Runs until the peer disconnects, an I/O error occurs, or the
    /// connection is closed elsewhere. Always deregisters and closes.
    pub async fn run(mut self) {
        let id = self.connection.id();
        let peer = self.connection.peer();

        if !self.registry.add(self.connection.clone()).await {
            debug!(session_id = %id, %peer, "Server stopping, refusing client");
            self.connection.close().await;
            return;
        }
        info!(session_id = %id, %peer, "Client connected");

        self.read_loop().await;

        self.registry.remove(id).await;
        self.connection.close().await;
        info!(session_id = %id, %peer, "Client disconnected");
    }

    async fn read_loop(&mut self) {
        let mut buf = vec![0u8; self.read_buffer_size];
        loop {
            let read = tokio::select! {
                _ = self.connection.closed().wait() => return,
                read = self.reader.read(&mut buf) => read,
            };

            let n = match read {
                Ok(0) => return,
                Ok(n) => n,
                Err(e) => {
                    debug!(session_id = %self.connection.id(), error = %e, "Read failed");
                    return;
                }
            };

            for frame in self.decoder.decode(&buf[..n]) {
                let keep_going = match frame {
                    Ok(text) => self.handle_frame(&text).await,
                    Err(e) => {
                        warn!(session_id = %self.connection.id(), error = %e, "Dropping frame");
                        true
                    }
                };
                if !keep_going {
                    return;
                }
            }
        }
    }

    /// Handles one frame. Returns false if the session must end.
    async fn handle_frame(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            return true;
        }

        let request = match Envelope::from_frame(text) {
            Ok(request) => request,
            Err(ProtocolError::NotAnObject) => {
                debug!(session_id = %self.connection.id(), "Ignoring non-object frame");
                return true;
            }
            Err(e) => {
                warn!(session_id = %self.connection.id(), error = %e, "Malformed request");
                return true;
            }
        };

        let response = self.dispatcher.dispatch(&request).await;
        let frame = match encode_frame(&response) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(session_id = %self.connection.id(), error = %e, "Failed to encode response");
                return true;
            }
        };

        match self.connection.send(&frame).await {
            Ok(()) => true,
            Err(e) => {
                debug!(session_id = %self.connection.id(), error = %e, "Write failed");
                false
            }
        }
    }
}
