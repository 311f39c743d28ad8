//! proctl - enable, disable and inspect subscription services

use anyhow::{Context, Result};
use clap::Parser;
use pro_common::config::CONFIG_PATH;
use pro_common::events::ConsoleEvents;
use pro_common::system::is_root;
use pro_common::Config;
use proctl::cli::{Cli, Commands};
use proctl::commands;
use proctl::errors::{EXIT_FAILURE, ROOT_REQUIRED};
use proctl::session::Session;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

fn load_config(explicit: Option<&Path>) -> Result<(Config, Option<String>)> {
    if let Some(path) = explicit {
        let config = Config::load_from_path(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?;
        return Ok((config, None));
    }
    match Config::load_from_path(CONFIG_PATH) {
        Ok(config) => Ok((config, None)),
        Err(e) => Ok((
            Config::default(),
            Some(format!("Config not loaded, using defaults: {}", e)),
        )),
    }
}

fn init_logging(config: &Config, debug: bool) {
    let fallback = if debug { "debug" } else { config.log_level.as_str() };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<i32> {
    let (config, load_warning) = load_config(cli.config.as_deref())?;
    init_logging(&config, cli.debug);
    if let Some(message) = load_warning {
        warn!("{}", message);
    }
    debug!("proctl v{} starting", env!("PRO_VERSION"));

    if cli.command.is_mutating() && !is_root() {
        eprintln!("{}", ROOT_REQUIRED);
        return Ok(EXIT_FAILURE);
    }

    let assume_yes = matches!(cli.command, Commands::Enable { assume_yes: true, .. });
    let events = Arc::new(ConsoleEvents::new(cli.command.is_quiet()));
    let session = Session::open(&config, events, assume_yes)?;

    match &cli.command {
        Commands::Status { all, format } => commands::status::run(&session, *all, *format),
        Commands::Enable { services, .. } => commands::enable::run(&session, services),
        Commands::Disable { services } => commands::disable::run(&session, services),
        Commands::ApplyDeltas {
            service,
            original,
            delta,
            allow_enable,
        } => commands::apply_deltas::run(&session, service, original, delta, *allow_enable),
    }
}

fn main() {
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            EXIT_FAILURE
        }
    };
    std::process::exit(code);
}
