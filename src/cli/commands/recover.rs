use crate::config::Config;
use crate::core::recovery::{Recovery, RecoveryOutcome};
use crate::core::tracker::Tracker;
use crate::errors::AppResult;
use crate::sources::clock::SystemClock;
use crate::store::FileStore;
use crate::ui::messages::{error, info, success, warning};
use crate::utils::time::{format_secs, local_string};

/// User-facing summary of a recovery.
pub fn print_recovery(r: &Recovery) {
    if let Some(note) = &r.note {
        warning(note);
    }
    if r.clock_skew {
        warning("Clock skew detected: the last snapshot is in the future; gap treated as zero.");
    }

    let gap = r.gap_secs.map(format_secs).unwrap_or_default();
    match r.outcome {
        RecoveryOutcome::Fresh => info("No open session; starting clocked out."),
        RecoveryOutcome::Resumed => {
            if let Some(s) = &r.session {
                success(format!(
                    "Resumed session {} ({}) after {} absence.",
                    s.id, s.state, gap
                ));
            }
        }
        RecoveryOutcome::AutoClosed => {
            if let Some(s) = &r.closed {
                let at = s.clock_out.map(|t| local_string(&t)).unwrap_or_default();
                warning(format!(
                    "Session {} closed at {} after {} absence (worked {}).",
                    s.id,
                    at,
                    gap,
                    format_secs(s.total_work_secs)
                ));
            }
        }
    }
}

/// Handle `recover`: reconcile once and persist the outcome.
pub fn handle(cfg: &Config) -> AppResult<()> {
    let store = FileStore::open(cfg)?;
    let (tracker, recovery) = Tracker::recover(store, SystemClock, cfg.clone());

    print_recovery(&recovery);
    if let Some(e) = tracker.last_persist_error() {
        error(format!("Recovery not fully written: {}", e));
    }
    Ok(())
}
