//! Flat record shared by the JSONL and CSV mirrors of the activity log.
//!
//! Both files are written from the same `LogRecord`, so their field
//! semantics cannot drift apart.

use crate::errors::{AppError, AppResult};
use crate::models::{EventKind, LogEntry, SessionState};
use crate::utils::time::parse_rfc3339;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: String,
    pub event: EventKind,
    pub session_id: String,
    pub state: SessionState,
    pub details: String,
}

/// Column order of the CSV mirror (serde field order).
pub const CSV_HEADERS: [&str; 5] = ["timestamp", "event", "session_id", "state", "details"];

impl From<&LogEntry> for LogRecord {
    fn from(e: &LogEntry) -> Self {
        Self {
            timestamp: e.timestamp.to_rfc3339(),
            event: e.kind,
            session_id: e.session_id.clone().unwrap_or_default(),
            state: e.state,
            details: e.details.clone(),
        }
    }
}

impl TryFrom<LogRecord> for LogEntry {
    type Error = AppError;

    fn try_from(r: LogRecord) -> AppResult<Self> {
        let timestamp = parse_rfc3339(&r.timestamp)
            .map_err(|_| AppError::CorruptState(format!("bad timestamp '{}'", r.timestamp)))?;
        Ok(LogEntry {
            timestamp,
            kind: r.event,
            session_id: (!r.session_id.is_empty()).then_some(r.session_id),
            state: r.state,
            details: r.details,
        })
    }
}

/// Decode one JSONL line.
pub fn parse_json_line(line: &str) -> AppResult<LogEntry> {
    let record: LogRecord = serde_json::from_str(line)
        .map_err(|e| AppError::CorruptState(format!("unreadable log line: {}", e)))?;
    LogEntry::try_from(record)
}
