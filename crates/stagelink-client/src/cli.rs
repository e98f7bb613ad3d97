//! Command-line interface definition.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use stagelink_core::{TracingConfig, TracingOutputFormat};
use tracing::Level;

/// stagelink - remote switching of stage devices over TCP
#[derive(Debug, Parser)]
#[command(name = "stagelink")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "STAGELINK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Log output format (compact, pretty, json)
    #[arg(long, default_value = "compact", global = true)]
    pub log_format: TracingOutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Logging setup for this invocation. JSON output uses the daemon preset.
    pub fn tracing_config(&self) -> TracingConfig {
        let level = if self.debug { Level::DEBUG } else { Level::INFO };
        match self.log_format {
            TracingOutputFormat::Json => TracingConfig::daemon(),
            format => TracingConfig::console().with_format(format),
        }
        .with_level(level)
    }
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the control server with an operator console on stdin
    Serve(ServeArgs),

    /// Switch a device on or off and print the answer
    Control {
        /// Device identifier
        device_id: String,

        /// Requested state
        state: SwitchState,

        #[command(flatten)]
        connect: ConnectArgs,
    },

    /// Print every message the server sends
    Listen {
        #[command(flatten)]
        connect: ConnectArgs,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Options for `serve`.
#[derive(Debug, Clone, Default, Args)]
pub struct ServeArgs {
    /// Port to listen on (1000-65535)
    #[arg(long, short, value_parser = port_arg)]
    pub port: Option<u16>,

    /// Address to bind to
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Wait for a `start` command instead of listening right away
    #[arg(long)]
    pub no_autostart: bool,
}

/// Options for commands that connect to a server.
#[derive(Debug, Clone, Default, Args)]
pub struct ConnectArgs {
    /// Server host
    #[arg(long)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short)]
    pub port: Option<u16>,

    /// Timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Requested device state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SwitchState {
    On,
    Off,
}

impl SwitchState {
    /// Returns true for [`SwitchState::On`].
    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Show configuration file path
    Path,
}

fn port_arg(value: &str) -> Result<u16, String> {
    stagelink_server::parse_port(value).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_defaults() {
        let cli = Cli::try_parse_from(["stagelink", "serve"]).unwrap();
        assert!(!cli.debug);
        assert_eq!(cli.log_format, TracingOutputFormat::Compact);
        match cli.command {
            Command::Serve(args) => {
                assert_eq!(args.port, None);
                assert_eq!(args.bind, None);
                assert!(!args.no_autostart);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn serve_with_options() {
        let cli = Cli::try_parse_from([
            "stagelink",
            "--debug",
            "--log-format",
            "json",
            "serve",
            "--port",
            "2000",
            "--bind",
            "127.0.0.1",
            "--no-autostart",
        ])
        .unwrap();
        assert!(cli.debug);
        assert_eq!(cli.log_format, TracingOutputFormat::Json);
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.port, Some(2000));
        assert_eq!(args.bind, Some("127.0.0.1".parse().unwrap()));
        assert!(args.no_autostart);
    }

    #[test]
    fn tracing_config_follows_flags() {
        let cli = Cli::try_parse_from(["stagelink", "serve"]).unwrap();
        let config = cli.tracing_config();
        assert_eq!(config.output_format, TracingOutputFormat::Compact);
        assert_eq!(config.default_level, Level::INFO);
        assert!(!config.include_span_events);

        let cli =
            Cli::try_parse_from(["stagelink", "-v", "--log-format", "json", "serve"]).unwrap();
        let config = cli.tracing_config();
        assert_eq!(config.output_format, TracingOutputFormat::Json);
        assert_eq!(config.default_level, Level::DEBUG);
        assert!(config.include_span_events);
        assert!(config.include_target);
    }

    #[test]
    fn serve_rejects_low_port() {
        assert!(Cli::try_parse_from(["stagelink", "serve", "--port", "80"]).is_err());
        assert!(Cli::try_parse_from(["stagelink", "serve", "--port", "x"]).is_err());
    }

    #[test]
    fn control_command() {
        let cli = Cli::try_parse_from([
            "stagelink", "control", "4711", "on", "--host", "10.0.0.2", "--port", "2000",
        ])
        .unwrap();
        let Command::Control {
            device_id,
            state,
            connect,
        } = cli.command
        else {
            panic!("expected control");
        };
        assert_eq!(device_id, "4711");
        assert!(state.is_on());
        assert_eq!(connect.host.as_deref(), Some("10.0.0.2"));
        assert_eq!(connect.port, Some(2000));
        assert_eq!(connect.timeout, None);
    }

    #[test]
    fn control_rejects_bad_state() {
        assert!(Cli::try_parse_from(["stagelink", "control", "4711", "maybe"]).is_err());
    }

    #[test]
    fn config_subcommands() {
        let cli = Cli::try_parse_from(["stagelink", "config", "path"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigAction::Path
            }
        ));
    }
}
