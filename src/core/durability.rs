//! Retried, ordered persistence of transitions.
//!
//! Writes for a transition go out as: log entries, archived session,
//! heartbeat. Anything that could not be written stays queued in memory and
//! is retried before the next transition is persisted, so the log never
//! shows a later transition before an earlier one.

use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::models::{Heartbeat, LogEntry, Session};
use crate::store::Persistence;
use std::collections::VecDeque;
use std::thread;
use std::time::Duration;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            attempts: cfg.persist_retry_limit.max(1),
            base_delay: Duration::from_millis(cfg.persist_backoff_ms),
            max_delay: Duration::from_secs(5),
        }
    }

    /// Retries without sleeping.
    pub fn immediate(attempts: u32) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay after the `attempt`-th failure (1-based): base, 2×base, 4×base… capped.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Run `op` until it succeeds, fails permanently, or transient failures
/// exhaust the policy.
pub fn with_retry<T>(
    policy: &RetryPolicy,
    operation: &'static str,
    mut op: impl FnMut() -> AppResult<T>,
) -> AppResult<T> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && attempt < policy.attempts => {
                let delay = policy.delay(attempt);
                warn!(operation, attempt, error = %e, ?delay, "write failed, retrying");
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
            }
            Err(e) if e.is_transient() => {
                error!(operation, attempts = attempt, error = %e, "write failed, giving up for now");
                return Err(AppError::PersistenceExhausted {
                    operation,
                    attempts: attempt,
                });
            }
            Err(e) => return Err(e),
        }
    }
}

/// Owns the store and the writes not yet known to be durable.
pub struct Persister<P: Persistence> {
    store: P,
    retry: RetryPolicy,
    pending_log: VecDeque<LogEntry>,
    pending_archive: VecDeque<Session>,
    pending_heartbeat: Option<Heartbeat>,
}

impl<P: Persistence> Persister<P> {
    pub fn new(store: P, retry: RetryPolicy) -> Self {
        Self {
            store,
            retry,
            pending_log: VecDeque::new(),
            pending_archive: VecDeque::new(),
            pending_heartbeat: None,
        }
    }

    pub fn store(&self) -> &P {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut P {
        &mut self.store
    }

    pub fn into_store(self) -> P {
        self.store
    }

    pub fn set_retry(&mut self, retry: RetryPolicy) {
        self.retry = retry;
    }

    /// True when every queued write has reached the store.
    pub fn is_durable(&self) -> bool {
        self.pending_log.is_empty()
            && self.pending_archive.is_empty()
            && self.pending_heartbeat.is_none()
    }

    pub fn pending(&self) -> usize {
        self.pending_log.len()
            + self.pending_archive.len()
            + usize::from(self.pending_heartbeat.is_some())
    }

    /// Queue one transition's writes behind anything still pending and flush.
    /// Only the newest heartbeat is kept: it is a snapshot, not a history.
    pub fn commit(
        &mut self,
        entries: Vec<LogEntry>,
        closed: Option<Session>,
        heartbeat: Heartbeat,
    ) -> AppResult<()> {
        self.pending_log.extend(entries);
        if let Some(s) = closed {
            self.pending_archive.push_back(s);
        }
        self.pending_heartbeat = Some(heartbeat);
        self.flush()
    }

    /// Write everything pending, in order. Stops at the first write whose
    /// retries are exhausted; that write and everything after it stay queued.
    /// Writes that fail permanently are dropped and counted.
    pub fn flush(&mut self) -> AppResult<()> {
        let mut dropped = 0usize;
        let mut last: Option<AppError> = None;

        while let Some(entry) = self.pending_log.front() {
            match with_retry(&self.retry, "log append", || self.store.append_log_entry(entry)) {
                Ok(()) => {}
                Err(e @ AppError::PersistenceExhausted { .. }) => return Err(e),
                Err(e) => {
                    error!(error = %e, "log entry cannot be written, dropping it");
                    dropped += 1;
                    last = Some(e);
                }
            }
            self.pending_log.pop_front();
        }

        while let Some(session) = self.pending_archive.front() {
            match with_retry(&self.retry, "session archive", || {
                self.store.archive_session(session)
            }) {
                Ok(()) => {}
                Err(e @ AppError::PersistenceExhausted { .. }) => return Err(e),
                Err(e) => {
                    error!(session = %session.id, error = %e, "session cannot be archived, dropping it");
                    dropped += 1;
                    last = Some(e);
                }
            }
            self.pending_archive.pop_front();
        }

        if let Some(hb) = &self.pending_heartbeat {
            match with_retry(&self.retry, "heartbeat write", || self.store.write_heartbeat(hb)) {
                Ok(()) => {}
                Err(e @ AppError::PersistenceExhausted { .. }) => return Err(e),
                Err(e) => {
                    error!(error = %e, "heartbeat cannot be written, dropping it");
                    dropped += 1;
                    last = Some(e);
                }
            }
            self.pending_heartbeat = None;
        }

        match last {
            Some(e) => Err(AppError::RecordsDropped {
                count: dropped,
                last: Box::new(e),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::models::{EventKind, SessionState};
    use crate::store::MemoryStore;
    use chrono::{TimeZone, Utc};

    fn entry(secs: i64, details: &str) -> LogEntry {
        let at = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
            + chrono::Duration::seconds(secs);
        LogEntry::new(at, EventKind::Lock, Some("s1"), SessionState::Working, details)
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = RetryPolicy {
            attempts: 10,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        };
        assert_eq!(p.delay(1), Duration::from_millis(200));
        assert_eq!(p.delay(2), Duration::from_millis(400));
        assert_eq!(p.delay(3), Duration::from_millis(800));
        assert_eq!(p.delay(8), Duration::from_secs(5));
    }

    #[test]
    fn non_transient_errors_are_not_retried() {
        let mut calls = 0;
        let res: AppResult<()> = with_retry(&RetryPolicy::immediate(5), "test", || {
            calls += 1;
            Err(AppError::Other("boom".into()))
        });
        assert!(matches!(res, Err(AppError::Other(_))));
        assert_eq!(calls, 1);
    }

    #[test]
    fn transient_errors_exhaust_after_limit() {
        let mut calls = 0;
        let res: AppResult<()> = with_retry(&RetryPolicy::immediate(3), "test", || {
            calls += 1;
            Err(AppError::Io(std::io::Error::other("disk full")))
        });
        assert!(matches!(
            res,
            Err(AppError::PersistenceExhausted { attempts: 3, .. })
        ));
        assert_eq!(calls, 3);
    }

    #[test]
    fn permanently_failing_writes_are_counted() {
        let mut store = MemoryStore::new();
        store.reject_log_appends(2);
        let mut p = Persister::new(store, RetryPolicy::immediate(3));

        let hb = Heartbeat::clocked_out(entry(30, "").timestamp);
        let res = p.commit(vec![entry(0, "a"), entry(10, "b"), entry(20, "c")], None, hb);

        assert!(matches!(res, Err(AppError::RecordsDropped { count: 2, .. })));
        assert!(p.is_durable());
        let kept: Vec<_> = p.store().log.iter().map(|e| e.details.as_str()).collect();
        assert_eq!(kept, vec!["c"]);
        assert_eq!(p.store().heartbeat_writes, 1);
    }
}
