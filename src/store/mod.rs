//! Durable storage behind the state machine.
//!
//! The heartbeat and the activity log live in plain files under the data
//! directory; closed sessions are archived in SQLite next to the internal
//! operations log.

pub mod activity_log;
pub mod heartbeat;
pub mod memory;
pub mod record;

use crate::config::Config;
use crate::db::log::ttlog;
use crate::db::migrate::run_pending_migrations;
use crate::db::pool::DbPool;
use crate::db::queries;
use crate::errors::AppResult;
use crate::models::{Heartbeat, HeartbeatRead, LogEntry, Session};
use activity_log::ActivityLog;
use heartbeat::HeartbeatFile;
use std::fs;
use tracing::warn;

pub use memory::MemoryStore;

/// What the state machine needs from durable storage.
pub trait Persistence {
    fn write_heartbeat(&mut self, heartbeat: &Heartbeat) -> AppResult<()>;

    fn append_log_entry(&mut self, entry: &LogEntry) -> AppResult<()>;

    fn read_heartbeat(&mut self) -> HeartbeatRead;

    /// The last `n` well-formed entries, oldest first.
    fn read_log_tail(&mut self, n: usize) -> AppResult<Vec<LogEntry>>;

    /// Store a closed session. Archiving the same session twice is a no-op.
    fn archive_session(&mut self, _session: &Session) -> AppResult<()> {
        Ok(())
    }

    /// Best-effort operational note; never affects durability.
    fn note(&mut self, _operation: &str, _target: &str, _message: &str) {}
}

/// Files plus SQLite, as laid out by the configuration.
pub struct FileStore {
    heartbeat: HeartbeatFile,
    log: ActivityLog,
    pool: DbPool,
}

impl FileStore {
    pub fn open(cfg: &Config) -> AppResult<Self> {
        fs::create_dir_all(cfg.data_path())?;

        let pool = DbPool::new(cfg.database_path())?;
        let applied = run_pending_migrations(&pool.conn)?;

        let mut store = Self {
            heartbeat: HeartbeatFile::new(cfg.heartbeat_path()),
            log: ActivityLog::new(cfg.json_log_path(), cfg.csv_log_path()),
            pool,
        };
        for version in applied {
            store.note("migration_applied", version, "Applied on open");
        }
        Ok(store)
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn activity_log(&self) -> &ActivityLog {
        &self.log
    }
}

impl Persistence for FileStore {
    fn write_heartbeat(&mut self, heartbeat: &Heartbeat) -> AppResult<()> {
        self.heartbeat.write(heartbeat)
    }

    fn append_log_entry(&mut self, entry: &LogEntry) -> AppResult<()> {
        self.log.append(entry)
    }

    fn read_heartbeat(&mut self) -> HeartbeatRead {
        self.heartbeat.read()
    }

    fn read_log_tail(&mut self, n: usize) -> AppResult<Vec<LogEntry>> {
        self.log.tail(n)
    }

    fn archive_session(&mut self, session: &Session) -> AppResult<()> {
        if queries::archive_session(&self.pool.conn, session)? {
            let reason = session.close_reason.map(|r| r.as_str()).unwrap_or("");
            self.note("archive", &session.id, reason);
        }
        Ok(())
    }

    fn note(&mut self, operation: &str, target: &str, message: &str) {
        if let Err(e) = ttlog(&self.pool.conn, operation, target, message) {
            warn!(operation, error = %e, "could not write internal log");
        }
    }
}
