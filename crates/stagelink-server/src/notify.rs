//! Operator-triggered announcements to connected clients.

use stagelink_core::{DeviceId, TargetResolver};
use stagelink_protocol::Envelope;
use tracing::info;

use crate::error::{ServerError, ServerResult};
use crate::server::ControlServer;

/// Result of a successful [`announce_selection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionReport {
    /// Device that was announced.
    pub device_id: DeviceId,
    /// Number of clients the broadcast reached.
    pub delivered: usize,
}

/// Broadcasts the operator's current target as `device-selected`.
///
/// # Errors
///
/// [`ServerError::NoClients`] if nobody is connected (nothing is sent),
/// [`ServerError::NoTarget`] if the resolver has no device selected, or
/// [`ServerError::NotRunning`] when the server is stopped.
pub async fn announce_selection(
    server: &ControlServer,
    resolver: &dyn TargetResolver,
) -> ServerResult<SelectionReport> {
    if !server.is_running().await {
        return Err(ServerError::NotRunning);
    }
    if server.connected_count().await == 0 {
        return Err(ServerError::NoClients);
    }
    let device_id = resolver.resolve_selected().ok_or(ServerError::NoTarget)?;

    let envelope = Envelope::device_selected(&device_id)?;
    let delivered = server.broadcast(&envelope).await?;
    info!(device_id = %device_id, delivered, "Announced device selection");

    Ok(SelectionReport {
        device_id,
        delivered,
    })
}

/// Broadcasts a free-form `info` notice. Returns the number of recipients.
pub async fn announce_info(server: &ControlServer, message: &str) -> ServerResult<usize> {
    let delivered = server.broadcast(&Envelope::info(message)).await?;
    info!(delivered, "Announced info notice");
    Ok(delivered)
}
