//! ibpilot CLI
//!
//! Usage:
//!   ibpilot send ENABLEAPI --port 7462        # Enable API connections
//!   ibpilot send STOP                         # Orderly shutdown
//!   ibpilot check-settings config.ini         # Print the effective configuration
//!   ibpilot check-settings gw.ini --gateway   # Same, for the API Gateway
//!   ibpilot jts-ini ~/Jts                     # Repair jts.ini in place

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use ibpilot::jts_ini::{JtsIni, JtsIniOutcome};
use ibpilot::protocol::ResponseKind;
use ibpilot::{AppMode, AutomationConfig, ConfigError, ExitCode, Settings};
use tracing::{error, info};

use crate::cli::{CheckSettingsArgs, Cli, Commands, JtsIniArgs, SendArgs};

mod cli;
mod client;
mod logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let guard = logging::init_logging(cli.log_dir.as_deref(), cli.verbose);

    let status = match run(cli.command).await {
        Ok(status) => status,
        Err(e) => {
            error!("{e:#}");
            eprintln!("error: {e:#}");
            1
        }
    };

    // process::exit skips destructors; flush the file writer first.
    drop(guard);
    std::process::exit(status);
}

async fn run(command: Commands) -> anyhow::Result<i32> {
    match command {
        Commands::Send(args) => send(args).await,
        Commands::CheckSettings(args) => check_settings(args),
        Commands::JtsIni(args) => jts_ini(args),
    }
}

async fn send(args: SendArgs) -> anyhow::Result<i32> {
    let mut line = args.verb.clone();
    for arg in &args.args {
        line.push(' ');
        line.push_str(arg);
    }

    let responses = client::send(
        &args.host,
        args.port,
        &line,
        &args.prompt,
        Duration::from_secs(args.timeout),
    )
    .await?;

    let mut status = 1;
    for (kind, text) in &responses {
        if text.is_empty() {
            println!("{}", kind.tag());
        } else {
            println!("{} {}", kind.tag(), text);
        }
        if *kind == ResponseKind::Ok {
            status = 0;
        }
    }
    Ok(status)
}

fn check_settings(args: CheckSettingsArgs) -> anyhow::Result<i32> {
    let mode = if args.gateway {
        AppMode::Gateway
    } else {
        AppMode::Tws
    };
    let settings = match Settings::load(&args.file) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}");
            return Ok(settings_exit_code(&e));
        }
    };
    let config = match AutomationConfig::from_settings(&settings, mode) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {e}", args.file.display());
            return Ok(settings_exit_code(&e));
        }
    };
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(0)
}

/// Same mapping the controller applies at startup.
fn settings_exit_code(err: &ConfigError) -> i32 {
    match err {
        ConfigError::Io { .. } => ExitCode::SettingsIo.code(),
        ConfigError::InvalidValue { .. } => ExitCode::Configuration.code(),
    }
}

fn jts_ini(args: JtsIniArgs) -> anyhow::Result<i32> {
    let dir = match args.dir {
        Some(dir) => dir,
        None => default_jts_dir().context("cannot determine the home directory; pass DIR")?,
    };
    let ini = JtsIni::in_dir(&dir);
    match ini.ensure_valid() {
        Ok(outcome) => {
            let verb = match outcome {
                JtsIniOutcome::AlreadyValid => "already valid",
                JtsIniOutcome::Created => "created",
                JtsIniOutcome::Rewritten => "rewritten",
            };
            info!(path = %ini.path().display(), ?outcome, "jts.ini checked");
            println!("{}: {verb}", ini.path().display());
            Ok(0)
        }
        Err(e) => {
            eprintln!("{e}");
            Ok(e.exit_code().code())
        }
    }
}

fn default_jts_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join("Jts"))
}
