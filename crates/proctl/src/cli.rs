//! CLI - Command-line argument parsing
//!
//! Keeps argument parsing separate from execution logic.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Subscription service client
#[derive(Parser, Debug)]
#[command(name = "proctl")]
#[command(about = "Manage subscription services on this machine", long_about = None)]
#[command(version = env!("PRO_VERSION"))]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Config file (defaults to /etc/pro/proctl.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Tabular,
    Json,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show service status
    Status {
        /// Include services this subscription is not entitled to
        #[arg(long)]
        all: bool,

        #[arg(long, value_enum, default_value_t = OutputFormat::Tabular)]
        format: OutputFormat,
    },

    /// Enable one or more services
    Enable {
        #[arg(required = true)]
        services: Vec<String>,

        /// Disable incompatible services without asking
        #[arg(long)]
        assume_yes: bool,
    },

    /// Disable one or more services
    Disable {
        #[arg(required = true)]
        services: Vec<String>,
    },

    /// Reconcile a service against a contract change
    ApplyDeltas {
        service: String,

        /// Previously cached entitlement access (JSON)
        #[arg(long)]
        original: PathBuf,

        /// Changed access keys (JSON)
        #[arg(long)]
        delta: PathBuf,

        /// Enable the service if the contract now enables it by default
        #[arg(long)]
        allow_enable: bool,
    },
}

impl Commands {
    /// Commands that change the machine need root
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Commands::Status { .. })
    }

    /// Machine-readable output keeps progress events off stdout
    pub fn is_quiet(&self) -> bool {
        matches!(
            self,
            Commands::Status {
                format: OutputFormat::Json,
                ..
            }
        )
    }
}
