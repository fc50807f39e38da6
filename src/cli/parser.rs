use crate::export::ExportFormat;
use clap::{Parser, Subcommand};

/// Command-line interface definition for rWorkClock
/// Working-time tracker with idle detection and crash recovery
#[derive(Parser, Debug)]
#[command(
    name = "rworkclock",
    version = env!("CARGO_PKG_VERSION"),
    about = "Track working time: clock in/out, breaks, idle auto clock-out and crash recovery",
    long_about = None
)]
pub struct Cli {
    /// Keep database, heartbeat and activity log under DIR
    #[arg(global = true, long = "data-dir", value_name = "DIR")]
    pub data_dir: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize configuration, database and data files
    Init,

    /// Manage the configuration file (view, check, migrate or edit)
    Config {
        #[arg(long = "print", help = "Print the current configuration")]
        print_config: bool,

        #[arg(long = "check", help = "Check configuration file for missing fields")]
        check: bool,

        #[arg(long = "migrate", help = "Add missing fields and import legacy settings")]
        migrate: bool,

        #[arg(
            long = "legacy",
            value_name = "FILE",
            requires = "migrate",
            help = "Legacy tracker_config.json to import (default: next to the config file)"
        )]
        legacy: Option<String>,

        #[arg(
            long = "edit",
            help = "Edit the configuration file (default editor: $EDITOR, or nano/notepad)"
        )]
        edit_config: bool,

        #[arg(
            long = "editor",
            help = "Specify the editor to use (vim, nano, or custom path)"
        )]
        editor: Option<String>,
    },

    /// Recover, then track live events read from stdin
    Run {
        #[arg(
            long = "activity-file",
            value_name = "PATH",
            help = "File whose modification time reports keyboard/mouse activity"
        )]
        activity_file: Option<String>,
    },

    /// Reconcile the last snapshot with the activity log and report the outcome
    Recover,

    /// Show the current state and live durations
    Status,

    /// List archived sessions
    List {
        #[arg(long, short, help = "Filter by year/month/day or a custom range")]
        period: Option<String>,

        #[arg(long = "today", help = "Show only today's sessions")]
        today: bool,
    },

    /// Export archived sessions
    Export {
        #[arg(long, value_enum, default_value = "csv")]
        format: ExportFormat,

        #[arg(long, value_name = "FILE")]
        file: String,

        #[arg(
            long,
            value_name = "RANGE",
            help = "Filter export by year/month/day or a custom range"
        )]
        range: Option<String>,

        #[arg(long, short = 'f')]
        force: bool,
    },

    /// Print the activity log or the internal log table
    Log {
        #[arg(long = "print", help = "Print the activity log")]
        print: bool,

        #[arg(
            long = "tail",
            value_name = "N",
            requires = "print",
            help = "Only the last N entries"
        )]
        tail: Option<usize>,

        #[arg(long = "internal", help = "Print rows from the internal log table")]
        internal: bool,
    },

    /// Manage the database (migrations, integrity checks, etc.)
    Db {
        #[arg(long = "migrate", help = "Run pending database migrations")]
        migrate: bool,

        #[arg(long = "check", help = "Check database integrity and pending migrations")]
        check: bool,

        #[arg(long = "vacuum", help = "Optimize the database using VACUUM")]
        vacuum: bool,

        #[arg(long = "info", help = "Show database information")]
        info: bool,
    },
}

impl Commands {
    /// Long-running commands log at `info` unless told otherwise.
    pub fn default_log_level(&self) -> &'static str {
        match self {
            Commands::Run { .. } => "info",
            _ => "warn",
        }
    }
}
