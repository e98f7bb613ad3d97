//! Shutdown signalling.
//!
//! [`ShutdownHandle`] is a cloneable one-way latch built on a watch channel.
//! The server uses it to stop its accept loop and to wake a session blocked
//! in a read when its connection is closed from elsewhere.
//! [`SignalHandler`] trips a latch on SIGTERM/SIGINT (Ctrl+C elsewhere).

use std::io;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

/// A handle for triggering or waiting on a shutdown latch.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    /// Creates an untriggered latch.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Triggers the latch. Later calls have no effect.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Returns a future-like signal that completes once triggered.
    pub fn wait(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.rx.clone(),
        }
    }
}

/// A signal that completes when shutdown is triggered.
#[derive(Debug)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Waits for the shutdown signal.
    pub async fn wait(mut self) {
        // The sender lives in every handle clone; an error means all are gone.
        let _ = self.rx.wait_for(|triggered| *triggered).await;
    }
}

/// Turns process signals into a shutdown latch.
#[derive(Debug, Default)]
pub struct SignalHandler {
    shutdown: ShutdownHandle,
}

impl SignalHandler {
    /// Creates a new signal handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the signal handlers and spawns the listener task.
    ///
    /// # Errors
    ///
    /// Returns an error if a handler cannot be registered.
    #[cfg(unix)]
    pub fn spawn_listener(&self) -> io::Result<()> {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM, initiating shutdown"),
                _ = sigint.recv() => info!("Received SIGINT, initiating shutdown"),
            }
            shutdown.trigger();
            debug!("Signal listener stopped");
        });

        Ok(())
    }

    /// Installs the Ctrl+C handler and spawns the listener task.
    #[cfg(not(unix))]
    pub fn spawn_listener(&self) -> io::Result<()> {
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received Ctrl+C, initiating shutdown");
                shutdown.trigger();
            }
        });

        Ok(())
    }

    /// Returns a signal that completes when shutdown is requested.
    pub fn shutdown(&self) -> ShutdownSignal {
        self.shutdown.wait()
    }

    /// Requests shutdown as if a signal had arrived.
    pub fn trigger_shutdown(&self) {
        self.shutdown.trigger();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_completes_pending_shutdown() {
        let handler = SignalHandler::new();
        let before = handler.shutdown();
        assert!(
            tokio::time::timeout(Duration::from_millis(20), handler.shutdown().wait())
                .await
                .is_err()
        );

        handler.trigger_shutdown();

        let result = tokio::time::timeout(Duration::from_millis(500), before.wait()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn wait_after_trigger_completes_immediately() {
        let handle = ShutdownHandle::new();
        handle.trigger();
        handle.trigger();

        let result = tokio::time::timeout(Duration::from_millis(50), handle.wait().wait()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn clones_share_the_latch() {
        let handle = ShutdownHandle::new();
        let clone = handle.clone();

        let waiter = tokio::spawn(async move {
            clone.wait().wait().await;
            true
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.trigger();

        let result = tokio::time::timeout(Duration::from_millis(500), waiter).await;
        assert!(result.unwrap().unwrap());
    }
}
