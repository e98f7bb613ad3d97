//! TCP control server: sessions, registry, dispatch, lifecycle.
//!
//! This crate provides the stagelink control server that handles:
//! - Accepting TCP clients and reading `^`-delimited JSON requests
//! - Dispatching `control-device` requests to a [`DeviceController`]
//! - Broadcasting operator announcements to every connected client
//! - Start/stop/restart of the listener from an operator console
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use stagelink_core::DeviceTable;
//! use stagelink_server::{ControlServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = ControlServer::new(ServerConfig::default(), Arc::new(DeviceTable::new()));
//!     let addr = server.start(None).await?;
//!     println!("listening on {addr}");
//!
//!     // Serve until told otherwise...
//!     server.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! [`DeviceController`]: stagelink_core::DeviceController

mod config;
mod connection;
mod dispatch;
mod error;
mod notify;
mod registry;
mod server;
mod session;
mod signals;

pub use config::{MAX_PORT, MIN_PORT, ServerConfig, parse_port};
pub use connection::{Connection, DEFAULT_WRITE_TIMEOUT};
pub use dispatch::CommandDispatcher;
pub use error::{ServerError, ServerResult};
pub use notify::{SelectionReport, announce_info, announce_selection};
pub use registry::ConnectionRegistry;
pub use server::ControlServer;
pub use session::ClientSession;
pub use signals::{ShutdownHandle, ShutdownSignal, SignalHandler};
