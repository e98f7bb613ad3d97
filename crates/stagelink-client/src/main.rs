//! stagelink CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use stagelink_client::cli::{Cli, Command, ConfigAction, ConnectArgs};
use stagelink_client::commands;
use stagelink_client::config::ClientConfig;
use stagelink_client::error::ClientResult;
use stagelink_client::socket::ControlClient;
use stagelink_core::init_tracing;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.tracing_config()) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config = match cli.config {
        Some(ref path) => ClientConfig::load_from(path)?,
        None => ClientConfig::load()?,
    };

    match cli.command {
        Command::Serve(args) => commands::serve::run(&args, &config).await,
        Command::Control {
            device_id,
            state,
            connect,
        } => {
            let client = client(&config, &connect);
            commands::control::run(&client, &device_id, state.is_on()).await
        }
        Command::Listen { connect } => commands::listen::run(&client(&config, &connect)).await,
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config),
            ConfigAction::Path => commands::config::path(),
        },
    }
}

fn client(config: &ClientConfig, args: &ConnectArgs) -> ControlClient {
    let mut settings = config.connect.clone();
    if let Some(ref host) = args.host {
        settings.host = host.clone();
    }
    if let Some(port) = args.port {
        settings.port = port;
    }
    if let Some(timeout) = args.timeout {
        settings.timeout_secs = timeout;
    }
    ControlClient::new(settings.address(), settings.timeout())
}
