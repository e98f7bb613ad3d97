//! Prints server broadcasts.

use tracing::info;

use crate::error::ClientResult;
use crate::socket::ControlClient;

/// Prints every frame from the server until it disconnects or Ctrl+C.
pub async fn run(client: &ControlClient) -> ClientResult<()> {
    info!(address = %client.address(), "listening for server messages");

    tokio::select! {
        result = client.listen(|frame| println!("{frame}")) => result,
        _ = tokio::signal::ctrl_c() => Ok(()),
    }
}
