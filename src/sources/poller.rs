//! Idle polling thread.
//!
//! Each cycle reloads the configuration if its file changed, runs the idle
//! detector against the activity source and checks for a wall-clock jump
//! that betrays an unreported sleep.

use crate::config::Config;
use crate::core::idle::IdleDetector;
use crate::core::tracker::Inbound;
use crate::models::{QueuedEvent, SystemEvent, Timestamp};
use crate::sources::activity::ActivitySource;
use crate::sources::clock::Clock;
use crossbeam_channel::Sender;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// A jump between consecutive polls larger than `limit_secs` means the
/// machine was suspended: sleep at the previous poll, resume now.
pub fn sleep_gap(
    previous: Timestamp,
    now: Timestamp,
    limit_secs: u64,
) -> Option<(QueuedEvent, QueuedEvent)> {
    let gap = (now - previous).num_seconds();
    if gap > limit_secs as i64 {
        Some((
            QueuedEvent::system(previous, SystemEvent::Sleep),
            QueuedEvent::system(now, SystemEvent::Resume),
        ))
    } else {
        None
    }
}

/// Detects edits of the configuration file by modification time.
#[derive(Debug)]
pub struct ConfigWatch {
    path: PathBuf,
    data_dir_override: Option<String>,
    seen: Option<SystemTime>,
}

impl ConfigWatch {
    pub fn new(path: PathBuf, data_dir_override: Option<String>) -> Self {
        let seen = fs::metadata(&path).and_then(|m| m.modified()).ok();
        Self {
            path,
            data_dir_override,
            seen,
        }
    }

    /// The reloaded configuration when the file changed since the last call.
    pub fn changed(&mut self) -> Option<Config> {
        let modified = fs::metadata(&self.path).and_then(|m| m.modified()).ok()?;
        if self.seen == Some(modified) {
            return None;
        }
        self.seen = Some(modified);

        match Config::load_from(&self.path) {
            Ok(cfg) => Some(match &self.data_dir_override {
                Some(dir) => cfg.with_data_dir(dir),
                None => cfg,
            }),
            Err(e) => {
                warn!(error = %e, "ignoring invalid configuration change");
                None
            }
        }
    }
}

pub struct Poller<C: Clock, A: ActivitySource> {
    clock: C,
    activity: A,
    detector: IdleDetector,
    threshold_secs: u64,
    interval: Duration,
    gap_limit_secs: u64,
    last_poll: Timestamp,
    watch: Option<ConfigWatch>,
}

fn gap_limit(cfg: &Config) -> u64 {
    cfg.sleep_gap_seconds.max(2 * cfg.poll_interval_seconds)
}

impl<C: Clock, A: ActivitySource> Poller<C, A> {
    pub fn new(clock: C, activity: A, detector: IdleDetector, cfg: &Config) -> Self {
        let last_poll = clock.now();
        Self {
            clock,
            activity,
            detector,
            threshold_secs: cfg.idle_threshold_seconds,
            interval: cfg.poll_interval(),
            gap_limit_secs: gap_limit(cfg),
            last_poll,
            watch: None,
        }
    }

    pub fn with_watch(mut self, watch: ConfigWatch) -> Self {
        self.watch = Some(watch);
        self
    }

    fn apply(&mut self, cfg: &Config) {
        self.threshold_secs = cfg.idle_threshold_seconds;
        self.interval = cfg.poll_interval();
        self.gap_limit_secs = gap_limit(cfg);
    }

    /// One evaluation cycle; messages are returned in emission order.
    pub fn poll_once(&mut self) -> Vec<Inbound> {
        let mut out = Vec::new();

        if let Some(cfg) = self.watch.as_mut().and_then(ConfigWatch::changed) {
            info!(
                threshold = cfg.idle_threshold_seconds,
                poll = cfg.poll_interval_seconds,
                "configuration file changed"
            );
            self.apply(&cfg);
            out.push(Inbound::Reconfigure(Box::new(cfg)));
        }

        let now = self.clock.now();
        let last = self.activity.last_activity();
        if let Some(ev) = self.detector.poll(last, now, self.threshold_secs) {
            debug!(event = %ev.event, at = %ev.at, "idle detector transition");
            out.push(Inbound::Event(ev));
        }

        if let Some((sleep, resume)) = sleep_gap(self.last_poll, now, self.gap_limit_secs) {
            info!(from = %sleep.at, to = %resume.at, "wall-clock jump; assuming the system slept");
            out.push(Inbound::Event(sleep));
            out.push(Inbound::Event(resume));
        }
        self.last_poll = now;

        out
    }

    /// Poll every interval until `stop` is set or the loop hangs up.
    pub fn spawn(mut self, tx: Sender<Inbound>, stop: Arc<AtomicBool>) -> JoinHandle<()>
    where
        C: 'static,
        A: 'static,
    {
        thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                for msg in self.poll_once() {
                    if tx.send(msg).is_err() {
                        return;
                    }
                }
                // Sleep in short slices so a stop request is noticed quickly.
                let mut left = self.interval;
                while !left.is_zero() && !stop.load(Ordering::SeqCst) {
                    let slice = left.min(Duration::from_millis(250));
                    thread::sleep(slice);
                    left = left.saturating_sub(slice);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn gap_above_limit_is_a_sleep() {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap();
        let t1 = t0 + chrono::Duration::seconds(500);
        let (sleep, resume) = sleep_gap(t0, t1, 120).unwrap();
        assert_eq!(sleep.at, t0);
        assert_eq!(resume.at, t1);
        assert!(sleep_gap(t0, t0 + chrono::Duration::seconds(120), 120).is_none());
    }
}
