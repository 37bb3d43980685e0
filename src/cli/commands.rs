//! CLI command definitions using clap.
//!
//! - run: run the bridge (default)
//! - show: display one payload locally
//! - check-config: validate configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// mqtt-notify - show MQTT messages as desktop notifications
#[derive(Parser, Debug)]
#[command(name = "mqtt-notify")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log to stderr instead of the log file
    #[arg(long, global = true)]
    pub log_stderr: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bridge until interrupted
    Run,

    /// Decode a JSON payload and show it once, without a broker
    Show {
        /// Payload, e.g. '{"title":"CPU","message":"hot"}'
        payload: String,
    },

    /// Load and validate the configuration, then exit
    CheckConfig,
}
