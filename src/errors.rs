//! Unified application error type.
//! All modules (store, db, core, cli, utils) return AppError to keep the error
//! handling consistent and easy to manage.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    // ---------------------------
    // IO / persistence
    // ---------------------------
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Database migration error: {0}")]
    Migration(String),

    #[error("{operation} still failing after {attempts} attempts")]
    PersistenceExhausted {
        operation: &'static str,
        attempts: u32,
    },

    #[error("{count} record(s) could not be written and were dropped (last error: {last})")]
    RecordsDropped { count: usize, last: Box<AppError> },

    // ---------------------------
    // Session state
    // ---------------------------
    #[error("Corrupt state: {0}")]
    CorruptState(String),

    #[error("Event '{event}' is not valid while {state}")]
    InvalidTransition { state: String, event: String },

    // ---------------------------
    // Parsing errors
    // ---------------------------
    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    #[error("Unknown command: {0}")]
    InvalidCommand(String),

    // ---------------------------
    // Config errors
    // ---------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load configuration")]
    ConfigLoad,

    #[error("Failed to save configuration")]
    ConfigSave,

    // ---------------------------
    // Export errors
    // ---------------------------
    #[error("Export error: {0}")]
    Export(String),

    // ---------------------------
    // Generic fallback
    // ---------------------------
    #[error("Internal error: {0}")]
    Other(String),
}

impl AppError {
    /// Failures worth retrying: the write may succeed on the next attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::Io(_) | AppError::Db(_) | AppError::Csv(_)
        )
    }
}

pub type AppResult<T> = Result<T, AppError>;
