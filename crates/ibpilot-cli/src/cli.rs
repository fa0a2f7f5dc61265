use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "ibpilot")]
#[command(about = "Operate an ibpilot-controlled trading workstation")]
#[command(version)]
pub struct Cli {
    /// Also write logs to a daily-rolling file in this directory
    #[clap(long, global = true, env = "IBPILOT_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[clap(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send one command over the command channel and print the responses
    Send(SendArgs),
    /// Validate a settings file and print the effective configuration as JSON
    CheckSettings(CheckSettingsArgs),
    /// Make sure jts.ini carries the settings unattended logins need
    JtsIni(JtsIniArgs),
}

#[derive(Parser, Debug)]
pub struct SendArgs {
    /// Command verb, e.g. ENABLEAPI, RECONNECTACCOUNT, RECONNECTDATA or STOP
    pub verb: String,

    /// Extra arguments, passed through verbatim
    pub args: Vec<String>,

    #[clap(long, default_value = "127.0.0.1", env = "IBPILOT_HOST")]
    pub host: String,

    #[clap(long, default_value_t = ibpilot::config::DEFAULT_CONTROLLER_PORT, env = "IBPILOT_PORT")]
    pub port: u16,

    /// The server's CommandPrompt, stripped from response lines
    #[clap(long, default_value = "")]
    pub prompt: String,

    /// Seconds to wait for the terminal response
    #[clap(long, default_value_t = 120)]
    pub timeout: u64,
}

#[derive(Parser, Debug)]
pub struct CheckSettingsArgs {
    /// Path of the key=value settings file
    pub file: PathBuf,

    /// Validate for the API Gateway instead of TWS
    #[clap(long)]
    pub gateway: bool,
}

#[derive(Parser, Debug)]
pub struct JtsIniArgs {
    /// Directory holding jts.ini (defaults to ~/Jts)
    pub dir: Option<PathBuf>,
}
