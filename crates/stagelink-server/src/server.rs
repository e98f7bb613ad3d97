//! TCP listener lifecycle.
//!
//! [`ControlServer`] can be started and stopped any number of times. Each run
//! owns its own listener, accept task, and [`ConnectionRegistry`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};

use stagelink_core::DeviceController;
use stagelink_protocol::Envelope;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::dispatch::CommandDispatcher;
use crate::error::{ServerError, ServerResult};
use crate::registry::ConnectionRegistry;
use crate::session::ClientSession;
use crate::signals::ShutdownHandle;

struct RunningServer {
    addr: SocketAddr,
    shutdown: ShutdownHandle,
    registry: Arc<ConnectionRegistry>,
    accept_task: JoinHandle<()>,
}

/// Control server accepting device requests over TCP.
pub struct ControlServer {
    config: ServerConfig,
    dispatcher: CommandDispatcher,
    port: AtomicU16,
    running: Mutex<Option<RunningServer>>,
}

impl ControlServer {
    /// Creates a stopped server.
    pub fn new(config: ServerConfig, controller: Arc<dyn DeviceController>) -> Self {
        Self {
            port: AtomicU16::new(config.port),
            config,
            dispatcher: CommandDispatcher::new(controller),
            running: Mutex::new(None),
        }
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Port the next `start(None)` will use.
    pub fn port(&self) -> u16 {
        self.port.load(Ordering::Relaxed)
    }

    /// Starts listening.
    ///
    /// An explicit `port` is remembered for later restarts. Returns the bound
    /// address, which differs from the requested one when port 0 is used.
    ///
    /// # Errors
    ///
    /// [`ServerError::AlreadyRunning`] if a run is active, or
    /// [`ServerError::Bind`] if the address cannot be bound.
    pub async fn start(&self, port: Option<u16>) -> ServerResult<SocketAddr> {
        let mut running = self.running.lock().await;
        if let Some(current) = running.as_ref() {
            return Err(ServerError::already_running(current.addr));
        }

        if let Some(port) = port {
            self.port.store(port, Ordering::Relaxed);
        }
        let requested = self.config.socket_addr(self.port());

        let listener = TcpListener::bind(requested)
            .await
            .map_err(|e| ServerError::bind(requested, e))?;
        let addr = listener.local_addr()?;

        let shutdown = ShutdownHandle::new();
        let registry = Arc::new(ConnectionRegistry::new());
        let accept_task = tokio::spawn(accept_loop(
            listener,
            self.config.clone(),
            self.dispatcher.clone(),
            registry.clone(),
            shutdown.clone(),
        ));

        info!(%addr, "Control server listening");
        *running = Some(RunningServer {
            addr,
            shutdown,
            registry,
            accept_task,
        });
        Ok(addr)
    }

    /// Stops listening and disconnects every client.
    ///
    /// Returns false if the server was not running.
    ///
    /// The run slot stays locked until the accept task has released the
    /// listener, so a `start` that follows can rebind the same port.
    pub async fn stop(&self) -> bool {
        let mut running = self.running.lock().await;
        let Some(run) = running.take() else {
            info!("Stop requested while not running");
            return false;
        };

        run.shutdown.trigger();
        if let Err(e) = run.accept_task.await {
            error!(error = %e, "Accept task failed");
        }
        drop(running);

        info!(addr = %run.addr, "Control server stopped");
        true
    }

    /// Returns true while a run is active.
    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Bound address of the active run.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|run| run.addr)
    }

    /// Number of connected clients; zero when stopped.
    pub async fn connected_count(&self) -> usize {
        match self.registry().await {
            Some(registry) => registry.connected_count().await,
            None => 0,
        }
    }

    /// Sends `envelope` to every connected client.
    ///
    /// # Errors
    ///
    /// [`ServerError::NotRunning`] when stopped, or a protocol error if the
    /// envelope cannot be encoded.
    pub async fn broadcast(&self, envelope: &Envelope) -> ServerResult<usize> {
        let registry = self.registry().await.ok_or(ServerError::NotRunning)?;
        Ok(registry.broadcast(envelope).await?)
    }

    async fn registry(&self) -> Option<Arc<ConnectionRegistry>> {
        self.running
            .lock()
            .await
            .as_ref()
            .map(|run| run.registry.clone())
    }
}

async fn accept_loop(
    listener: TcpListener,
    config: ServerConfig,
    dispatcher: CommandDispatcher,
    registry: Arc<ConnectionRegistry>,
    shutdown: ShutdownHandle,
) {
    let mut sessions = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.wait().wait() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!(%peer, error = %e, "Failed to set TCP_NODELAY");
                    }
                    let session = ClientSession::new(
                        stream,
                        peer,
                        &config,
                        dispatcher.clone(),
                        registry.clone(),
                    );
                    sessions.spawn(session.run());
                }
                Err(e) => error!(error = %e, "Failed to accept connection"),
            },
            Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
        }
    }

    drop(listener);
    registry.close_all().await;

    let drain = async { while sessions.join_next().await.is_some() {} };
    if tokio::time::timeout(config.shutdown_grace, drain).await.is_err() {
        warn!("Sessions did not finish in time, aborting");
        sessions.abort_all();
    }
}
