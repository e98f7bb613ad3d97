//! Connected clients and broadcast fan-out.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use stagelink_protocol::{Envelope, ProtocolResult, encode_frame};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::connection::Connection;

#[derive(Debug, Default)]
struct Inner {
    connections: HashMap<Uuid, Arc<Connection>>,
    sealed: bool,
}

/// Set of live client connections for one server run.
///
/// Once [`close_all`](Self::close_all) has run the registry is sealed and
/// refuses new connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    inner: RwLock<Inner>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection. Returns false if the registry is sealed.
    pub async fn add(&self, connection: Arc<Connection>) -> bool {
        let mut inner = self.inner.write().await;
        if inner.sealed {
            return false;
        }
        inner.connections.insert(connection.id(), connection);
        true
    }

    /// Removes a connection. Removing an unknown id is a no-op.
    pub async fn remove(&self, id: Uuid) -> Option<Arc<Connection>> {
        self.inner.write().await.connections.remove(&id)
    }

    /// Number of registered connections.
    pub async fn connected_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }

    /// Returns true if no client is connected.
    pub async fn is_empty(&self) -> bool {
        self.connected_count().await == 0
    }

    /// Sends `envelope` to every registered connection.
    ///
    /// The frame is encoded once and written to all clients concurrently.
    /// Clients whose write fails are closed and dropped from the registry.
    /// Returns the number of clients the frame reached.
    pub async fn broadcast(&self, envelope: &Envelope) -> ProtocolResult<usize> {
        let frame = encode_frame(envelope)?;
        let targets: Vec<Arc<Connection>> =
            self.inner.read().await.connections.values().cloned().collect();

        debug!(request_type = %envelope.kind, recipients = targets.len(), "Broadcasting");

        let results = join_all(targets.iter().map(|conn| conn.send(&frame))).await;

        let mut delivered = 0;
        for (conn, result) in targets.iter().zip(results) {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(session_id = %conn.id(), peer = %conn.peer(), error = %e, "Broadcast write failed");
                    self.remove(conn.id()).await;
                    conn.close().await;
                }
            }
        }
        Ok(delivered)
    }

    /// Seals the registry and closes every connection.
    pub async fn close_all(&self) {
        let drained: Vec<Arc<Connection>> = {
            let mut inner = self.inner.write().await;
            inner.sealed = true;
            inner.connections.drain().map(|(_, conn)| conn).collect()
        };

        debug!(count = drained.len(), "Closing all connections");
        join_all(drained.iter().map(|conn| conn.close())).await;
    }
}
