//! rWorkClock library root.
//! Exposes the CLI parser, the session core and the high-level run() function.

pub mod cli;
pub mod config;
pub mod core;
pub mod db;
pub mod errors;
pub mod export;
pub mod models;
pub mod sources;
pub mod store;
pub mod ui;
pub mod utils;

use clap::Parser;
use cli::parser::{Cli, Commands};
use config::Config;
use errors::AppResult;
use tracing_subscriber::EnvFilter;

/// Central command dispatcher
pub fn dispatch(cli: &Cli, cfg: &Config) -> AppResult<()> {
    match &cli.command {
        Commands::Init => cli::commands::init::handle(cli),
        Commands::Config { .. } => cli::commands::config::handle(&cli.command, cfg),
        Commands::Run { .. } => cli::commands::run::handle(cli, cfg),
        Commands::Recover => cli::commands::recover::handle(cfg),
        Commands::Status => cli::commands::status::handle(cfg),
        Commands::List { .. } => cli::commands::list::handle(&cli.command, cfg),
        Commands::Export { .. } => cli::commands::export::handle(&cli.command, cfg),
        Commands::Log { .. } => cli::commands::log::handle(&cli.command, cfg),
        Commands::Db { .. } => cli::commands::db::handle(&cli.command, cfg),
    }
}

/// Diagnostics go to stderr. `RWORKCLOCK_DEBUG_LOG` forces debug output,
/// otherwise `RUST_LOG` applies, falling back to `default_level`.
pub fn init_logging(default_level: &str) {
    let forced = std::env::var("RWORKCLOCK_DEBUG_LOG")
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);

    let filter = if forced {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Entry point used by main.rs
pub fn run() -> AppResult<()> {
    // 1️⃣ parse CLI
    let cli = Cli::parse();

    init_logging(cli.command.default_log_level());

    // 2️⃣ load config once (init creates it, so a broken file must not block it)
    let cfg = match &cli.command {
        Commands::Init => Config::default(),
        _ => Config::load()?,
    };

    // 3️⃣ command-line override of the data location
    let cfg = match &cli.data_dir {
        Some(dir) => cfg.with_data_dir(dir),
        None => cfg,
    };

    // 4️⃣ hand everything to the dispatcher
    dispatch(&cli, &cfg)
}
