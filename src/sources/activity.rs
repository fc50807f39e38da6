use crate::models::Timestamp;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Reports when the user was last active. Polled; never goes backwards.
pub trait ActivitySource: Send {
    fn last_activity(&self) -> Timestamp;
}

/// Activity recorded by another thread (the stdin reader).
#[derive(Debug, Clone)]
pub struct SharedActivity {
    secs: Arc<AtomicI64>,
}

impl SharedActivity {
    pub fn new(start: Timestamp) -> Self {
        Self {
            secs: Arc::new(AtomicI64::new(start.timestamp())),
        }
    }

    /// Record activity at `at`; older timestamps are ignored.
    pub fn record(&self, at: Timestamp) {
        self.secs.fetch_max(at.timestamp(), Ordering::SeqCst);
    }
}

impl ActivitySource for SharedActivity {
    fn last_activity(&self) -> Timestamp {
        DateTime::from_timestamp(self.secs.load(Ordering::SeqCst), 0).unwrap_or_default()
    }
}

/// A file whose modification time marks activity (touched by an editor
/// hook, a shell prompt, ...), combined with a fallback source.
#[derive(Debug, Clone)]
pub struct TouchFileActivity {
    path: PathBuf,
    fallback: SharedActivity,
}

impl TouchFileActivity {
    pub fn new(path: PathBuf, fallback: SharedActivity) -> Self {
        Self { path, fallback }
    }

    fn touched_at(&self) -> Option<Timestamp> {
        let modified = fs::metadata(&self.path).ok()?.modified().ok()?;
        let at: DateTime<Utc> = modified.into();
        DateTime::from_timestamp(at.timestamp(), 0)
    }
}

impl ActivitySource for TouchFileActivity {
    fn last_activity(&self) -> Timestamp {
        let fallback = self.fallback.last_activity();
        match self.touched_at() {
            Some(t) if t > fallback => {
                self.fallback.record(t);
                t
            }
            _ => fallback,
        }
    }
}
