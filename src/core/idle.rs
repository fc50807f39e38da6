//! Polled idle detection.
//!
//! Idle state is recomputed from the last activity timestamp on every poll
//! instead of being scheduled as a one-shot timer, so a pending timeout is
//! cancelled simply by newer activity arriving before the next poll.

use crate::models::{IdleTransition, QueuedEvent, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleStatus {
    Active,
    Idle,
}

/// Level evaluation: idle once the time since the last activity strictly
/// exceeds the threshold.
pub fn evaluate(now: Timestamp, last_activity: Timestamp, threshold_secs: u64) -> IdleStatus {
    let elapsed = (now - last_activity).num_seconds();
    if elapsed > threshold_secs as i64 {
        IdleStatus::Idle
    } else {
        IdleStatus::Active
    }
}

/// Edge-triggered wrapper around [`evaluate`]: emits one `Idle` event when the
/// threshold is first exceeded and one `ActivityResumed` on the first newer
/// activity afterwards. Repeated polls in the same state emit nothing.
#[derive(Debug, Clone)]
pub struct IdleDetector {
    status: IdleStatus,
    last_activity: Timestamp,
}

impl IdleDetector {
    pub fn new(last_activity: Timestamp) -> Self {
        Self {
            status: IdleStatus::Active,
            last_activity,
        }
    }

    /// Start already idle, e.g. after recovering an IdleSuspended session.
    pub fn idle_since(last_activity: Timestamp) -> Self {
        Self {
            status: IdleStatus::Idle,
            last_activity,
        }
    }

    pub fn status(&self) -> IdleStatus {
        self.status
    }

    pub fn last_activity(&self) -> Timestamp {
        self.last_activity
    }

    /// Record an activity timestamp. Older or equal timestamps are ignored.
    pub fn observe(&mut self, activity: Timestamp) -> Option<QueuedEvent> {
        if activity <= self.last_activity {
            return None;
        }
        self.last_activity = activity;

        if self.status == IdleStatus::Idle {
            self.status = IdleStatus::Active;
            return Some(QueuedEvent::idle(activity, IdleTransition::ActivityResumed));
        }
        None
    }

    /// Evaluate at `now`. The emitted `Idle` event is back-dated to the last
    /// activity so idle time is measured from true inactivity, not from the
    /// poll that noticed it.
    pub fn evaluate(&mut self, now: Timestamp, threshold_secs: u64) -> Option<QueuedEvent> {
        if self.status == IdleStatus::Idle {
            return None;
        }
        if evaluate(now, self.last_activity, threshold_secs) == IdleStatus::Idle {
            self.status = IdleStatus::Idle;
            return Some(QueuedEvent::idle(self.last_activity, IdleTransition::Idle));
        }
        None
    }

    /// One poll cycle: feed the source's latest activity, then evaluate.
    pub fn poll(
        &mut self,
        last_activity: Timestamp,
        now: Timestamp,
        threshold_secs: u64,
    ) -> Option<QueuedEvent> {
        if let Some(resumed) = self.observe(last_activity) {
            return Some(resumed);
        }
        self.evaluate(now, threshold_secs)
    }
}
