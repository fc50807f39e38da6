use super::Persistence;
use crate::errors::{AppError, AppResult};
use crate::models::{Heartbeat, HeartbeatRead, LogEntry, Session};
use std::io;

/// In-memory store with programmable write failures.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    pub heartbeat: Option<Heartbeat>,
    /// When set, `read_heartbeat` reports a corrupt file.
    pub corrupt_heartbeat: Option<String>,
    pub log: Vec<LogEntry>,
    pub archived: Vec<Session>,
    pub notes: Vec<(String, String, String)>,
    /// Number of heartbeat writes performed successfully.
    pub heartbeat_writes: usize,
    fail_heartbeat: u32,
    fail_log: u32,
    reject_log: u32,
    fail_archive: u32,
}

fn injected(what: &str) -> AppError {
    AppError::Io(io::Error::other(format!("injected {} failure", what)))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_heartbeat(heartbeat: Heartbeat) -> Self {
        Self {
            heartbeat: Some(heartbeat),
            ..Self::default()
        }
    }

    /// The next `n` heartbeat writes fail with an I/O error.
    pub fn fail_heartbeat_writes(&mut self, n: u32) {
        self.fail_heartbeat = n;
    }

    pub fn fail_log_appends(&mut self, n: u32) {
        self.fail_log = n;
    }

    /// The next `n` log appends fail with an error that retrying cannot fix.
    pub fn reject_log_appends(&mut self, n: u32) {
        self.reject_log = n;
    }

    pub fn fail_archive_writes(&mut self, n: u32) {
        self.fail_archive = n;
    }
}

fn take_failure(counter: &mut u32) -> bool {
    if *counter > 0 {
        *counter -= 1;
        true
    } else {
        false
    }
}

impl Persistence for MemoryStore {
    fn write_heartbeat(&mut self, heartbeat: &Heartbeat) -> AppResult<()> {
        if take_failure(&mut self.fail_heartbeat) {
            return Err(injected("heartbeat"));
        }
        self.heartbeat = Some(heartbeat.clone());
        self.corrupt_heartbeat = None;
        self.heartbeat_writes += 1;
        Ok(())
    }

    fn append_log_entry(&mut self, entry: &LogEntry) -> AppResult<()> {
        if take_failure(&mut self.fail_log) {
            return Err(injected("log"));
        }
        if take_failure(&mut self.reject_log) {
            return Err(AppError::Other("injected log rejection".into()));
        }
        self.log.push(entry.clone());
        Ok(())
    }

    fn read_heartbeat(&mut self) -> HeartbeatRead {
        if let Some(reason) = &self.corrupt_heartbeat {
            return HeartbeatRead::Corrupt(reason.clone());
        }
        match &self.heartbeat {
            Some(hb) => HeartbeatRead::Present(hb.clone()),
            None => HeartbeatRead::Absent,
        }
    }

    fn read_log_tail(&mut self, n: usize) -> AppResult<Vec<LogEntry>> {
        let start = self.log.len().saturating_sub(n);
        Ok(self.log[start..].to_vec())
    }

    fn archive_session(&mut self, session: &Session) -> AppResult<()> {
        if take_failure(&mut self.fail_archive) {
            return Err(injected("archive"));
        }
        if !self.archived.iter().any(|s| s.id == session.id) {
            self.archived.push(session.clone());
        }
        Ok(())
    }

    fn note(&mut self, operation: &str, target: &str, message: &str) {
        self.notes
            .push((operation.into(), target.into(), message.into()));
    }
}
