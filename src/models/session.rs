use super::Timestamp;
use super::session_state::{CloseReason, IdleCause, SessionState};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One clock-in to clock-out work period.
///
/// Totals are maintained by segment accounting: whenever the state changes,
/// the time elapsed since `state_since` is credited to the bucket of the state
/// that is being left. For a closed session
/// `work + break + idle == clock_out - clock_in` holds by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub clock_in: Timestamp,
    pub clock_out: Option<Timestamp>,
    pub total_work_secs: i64,
    pub total_break_secs: i64,
    pub total_idle_secs: i64,
    pub state: SessionState,
    pub state_since: Timestamp,
    #[serde(default)]
    pub idle_since: Option<Timestamp>,
    #[serde(default)]
    pub idle_cause: Option<IdleCause>,
    /// State to return to when an idle suspension ends (Working or OnBreak).
    #[serde(default)]
    pub resume_to: Option<SessionState>,
    #[serde(default)]
    pub close_reason: Option<CloseReason>,
}

impl Session {
    pub fn open(at: Timestamp) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), at)
    }

    pub fn with_id(id: impl Into<String>, at: Timestamp) -> Self {
        Self {
            id: id.into(),
            clock_in: at,
            clock_out: None,
            total_work_secs: 0,
            total_break_secs: 0,
            total_idle_secs: 0,
            state: SessionState::Working,
            state_since: at,
            idle_since: None,
            idle_cause: None,
            resume_to: None,
            close_reason: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.clock_out.is_some()
    }

    /// Credit the time elapsed since the last transition to the current state.
    /// Returns the credited seconds (never negative).
    pub fn account(&mut self, at: Timestamp) -> i64 {
        let elapsed = (at - self.state_since).num_seconds().max(0);
        match self.state {
            SessionState::Working => self.total_work_secs += elapsed,
            SessionState::OnBreak => self.total_break_secs += elapsed,
            SessionState::IdleSuspended => self.total_idle_secs += elapsed,
            SessionState::ClockedOut => {}
        }
        if at > self.state_since {
            self.state_since = at;
        }
        elapsed
    }

    /// Account the current segment and switch to `state`.
    pub fn enter(&mut self, state: SessionState, at: Timestamp) -> i64 {
        let elapsed = self.account(at);
        self.state = state;
        elapsed
    }

    pub fn suspend(&mut self, cause: IdleCause, at: Timestamp) {
        let previous = self.state;
        self.enter(SessionState::IdleSuspended, at);
        self.idle_since = Some(self.state_since);
        self.idle_cause = Some(cause);
        self.resume_to = Some(previous);
    }

    /// End an idle suspension, returning to the pre-idle state.
    /// Returns the idle seconds credited by this call.
    pub fn resume(&mut self, at: Timestamp) -> i64 {
        let target = self.resume_to.take().unwrap_or(SessionState::Working);
        let idle = self.enter(target, at);
        self.idle_since = None;
        self.idle_cause = None;
        idle
    }

    /// Close the session at `at`. A session is closed at most once; later
    /// calls leave `clock_out` untouched and return false.
    pub fn close(&mut self, at: Timestamp, reason: CloseReason) -> bool {
        if self.is_closed() {
            return false;
        }
        let at = at.max(self.state_since);
        self.enter(SessionState::ClockedOut, at);
        self.clock_out = Some(at);
        self.close_reason = Some(reason);
        self.idle_since = None;
        self.idle_cause = None;
        self.resume_to = None;
        true
    }

    /// clock_out - clock_in for closed sessions, elapsed until `now` otherwise.
    pub fn span_secs(&self, now: Timestamp) -> i64 {
        let end = self.clock_out.unwrap_or(now);
        (end - self.clock_in).num_seconds().max(0)
    }

    /// Totals including the running segment, without mutating the session.
    pub fn live_totals(&self, now: Timestamp) -> SessionTotals {
        let mut probe = self.clone();
        if !probe.is_closed() {
            probe.account(now);
        }
        SessionTotals {
            work_secs: probe.total_work_secs,
            break_secs: probe.total_break_secs,
            idle_secs: probe.total_idle_secs,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionTotals {
    pub work_secs: i64,
    pub break_secs: i64,
    pub idle_secs: i64,
}

impl SessionTotals {
    pub fn sum(&self) -> i64 {
        self.work_secs + self.break_secs + self.idle_secs
    }
}
