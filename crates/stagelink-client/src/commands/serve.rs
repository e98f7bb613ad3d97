//! Serve command: runs the control server with an operator console.
//!
//! The console reads one command per line from stdin. SIGINT/SIGTERM stop
//! the server and exit; so does `quit`. When stdin closes the server keeps
//! running until a signal arrives.

use std::str::FromStr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use stagelink_core::{DeviceId, DeviceTable, TargetResolver};
use stagelink_server::{
    ControlServer, ServerError, SignalHandler, announce_info, announce_selection, parse_port,
};

use crate::cli::ServeArgs;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

const HELP: &str = "\
commands:
  start [port]        start listening (port 1000-65535, default: last used)
  stop                stop listening and disconnect all clients
  status              show listener state and client count
  devices             list known devices
  select <device-id>  choose the device `send` announces
  send                announce the selected device to all clients
  say <text>          broadcast an info message to all clients
  help                show this help
  quit                stop the server and exit";

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Start(Option<u16>),
    Stop,
    Status,
    Devices,
    Select(DeviceId),
    Send,
    Say(String),
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = ClientError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "start" if rest.is_empty() => Self::Start(None),
            "start" => Self::Start(Some(parse_port(rest)?)),
            "stop" => Self::Stop,
            "status" => Self::Status,
            "devices" => Self::Devices,
            "select" if rest.is_empty() => {
                return Err(ClientError::usage("usage: select <device-id>"));
            }
            "select" => Self::Select(DeviceId::new(rest)),
            "send" => Self::Send,
            "say" if rest.is_empty() => return Err(ClientError::usage("usage: say <text>")),
            "say" => Self::Say(rest.to_string()),
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => {
                return Err(ClientError::usage(format!(
                    "unknown command '{other}', type 'help' for a list"
                )));
            }
        };
        Ok(command)
    }
}

/// Operator console bound to one server and device table.
pub struct Console {
    server: ControlServer,
    devices: Arc<DeviceTable>,
}

impl Console {
    /// Creates a console for a stopped server.
    pub fn new(server: ControlServer, devices: Arc<DeviceTable>) -> Self {
        Self { server, devices }
    }

    /// The managed server.
    pub fn server(&self) -> &ControlServer {
        &self.server
    }

    /// Executes one command and returns the text to show the operator.
    ///
    /// `Quit` is handled by the caller and only yields a farewell here.
    pub async fn execute(&self, command: ConsoleCommand) -> ClientResult<String> {
        debug!(?command, "console command");
        match command {
            ConsoleCommand::Start(port) => {
                let addr = self.server.start(port).await?;
                Ok(format!("listening on {addr}"))
            }
            ConsoleCommand::Stop => Ok(if self.server.stop().await {
                "server stopped".to_string()
            } else {
                "server is not running".to_string()
            }),
            ConsoleCommand::Status => Ok(match self.server.local_addr().await {
                Some(addr) => format!(
                    "running on {addr}, {} client(s) connected",
                    self.server.connected_count().await
                ),
                None => format!("stopped (next port {})", self.server.port()),
            }),
            ConsoleCommand::Devices => Ok(self.device_list()),
            ConsoleCommand::Select(id) => {
                if self.devices.select(&id) {
                    Ok(format!("selected {id}"))
                } else {
                    Err(ClientError::usage(format!("unknown device '{id}'")))
                }
            }
            ConsoleCommand::Send => {
                let report = announce_selection(&self.server, self.devices.as_ref()).await?;
                Ok(format!(
                    "announced {} to {} client(s)",
                    report.device_id, report.delivered
                ))
            }
            ConsoleCommand::Say(text) => {
                let delivered = announce_info(&self.server, &text).await?;
                Ok(format!("sent to {delivered} client(s)"))
            }
            ConsoleCommand::Help => Ok(HELP.to_string()),
            ConsoleCommand::Quit => Ok("bye".to_string()),
        }
    }

    fn device_list(&self) -> String {
        let devices = self.devices.devices();
        if devices.is_empty() {
            return "no devices configured".to_string();
        }

        let selected = self.devices.resolve_selected();
        devices
            .iter()
            .map(|device| {
                let marker = if selected.as_ref() == Some(&device.id) {
                    '*'
                } else {
                    ' '
                };
                let state = if device.on { "on" } else { "off" };
                match &device.name {
                    Some(name) => format!("{marker} {} [{state}] {name}", device.id),
                    None => format!("{marker} {} [{state}]", device.id),
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Runs the server in the foreground until `quit` or a shutdown signal.
///
/// `quit` trips the same latch as SIGINT/SIGTERM, so every exit goes through
/// one path.
pub async fn run(args: &ServeArgs, config: &ClientConfig) -> ClientResult<()> {
    let mut server_config = config.server_config();
    if let Some(port) = args.port {
        server_config.port = port;
    }
    if let Some(bind) = args.bind {
        server_config = server_config.with_bind_address(bind);
    }

    let devices = Arc::new(config.device_table());
    let console = Console::new(ControlServer::new(server_config, devices.clone()), devices);

    let signals = SignalHandler::new();
    signals.spawn_listener()?;

    if !args.no_autostart {
        let addr = console.server().start(None).await?;
        println!("listening on {addr}");
    }
    println!("type 'help' for commands");

    let shutdown = signals.shutdown().wait();
    tokio::pin!(shutdown);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => match line.parse::<ConsoleCommand>() {
                    Ok(ConsoleCommand::Quit) => signals.trigger_shutdown(),
                    Ok(command) => match console.execute(command).await {
                        Ok(reply) => println!("{reply}"),
                        Err(e) => eprintln!("{}", operator_message(&e)),
                    },
                    Err(e) => eprintln!("{}", operator_message(&e)),
                },
                None => {
                    info!("stdin closed, serving until signalled");
                    stdin_open = false;
                }
            },
        }
    }

    console.server().stop().await;
    Ok(())
}

fn operator_message(error: &ClientError) -> String {
    match error {
        ClientError::Server(ServerError::NoClients) => "no client connected".to_string(),
        ClientError::Server(ServerError::NoTarget) => {
            "no device selected, use 'select <device-id>'".to_string()
        }
        other => format!("error: {other}"),
    }
}
