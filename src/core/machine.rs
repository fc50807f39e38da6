//! Session state machine.
//!
//! The open session is a single owned value moved through [`apply`]; the
//! [`SessionMachine`] wrapper only adds timestamp ordering. Validation
//! ([`check`]) is separate so a rejected event never touches the session.

use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::models::{
    CloseReason, EventKind, Heartbeat, IdleCause, IdleTransition, LogEntry, QueuedEvent, Session,
    SessionEvent, SessionState, SystemEvent, Timestamp, UserCommand,
};
use crate::utils::time::{format_secs, local_hms};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub idle_threshold_secs: u64,
    pub grace_margin_secs: u64,
    pub lock_triggers_idle: bool,
}

impl Policy {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            idle_threshold_secs: cfg.idle_threshold_seconds,
            grace_margin_secs: cfg.grace_margin_seconds(),
            lock_triggers_idle: cfg.lock_triggers_idle,
        }
    }

    /// Idle intervals at least this long end in an auto clock-out.
    pub fn auto_clock_out_secs(&self) -> i64 {
        (self.idle_threshold_secs + self.grace_margin_secs) as i64
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// What a single transition produced, in timestamp order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Step {
    pub entries: Vec<LogEntry>,
    /// Set when this step closed the session.
    pub closed: Option<Session>,
}

impl Step {
    fn entry(entry: LogEntry) -> Self {
        Self {
            entries: vec![entry],
            closed: None,
        }
    }

    /// Nothing to log or persist (event ignored in the current state).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.closed.is_none()
    }
}

fn state_of(session: Option<&Session>) -> SessionState {
    session.map(|s| s.state).unwrap_or(SessionState::ClockedOut)
}

/// Reject user commands that make no sense in the current state.
/// Idle and OS events are always accepted (possibly as no-ops).
pub fn check(session: Option<&Session>, event: &SessionEvent) -> AppResult<()> {
    let state = state_of(session);
    let ok = match event {
        SessionEvent::User(UserCommand::ClockIn) => state == SessionState::ClockedOut,
        SessionEvent::User(UserCommand::ClockOut) => state.is_open(),
        SessionEvent::User(UserCommand::BreakStart) => state == SessionState::Working,
        SessionEvent::User(UserCommand::BreakEnd) => state == SessionState::OnBreak,
        SessionEvent::Idle(_) | SessionEvent::System(_) => true,
    };

    if ok {
        Ok(())
    } else {
        Err(AppError::InvalidTransition {
            state: state.to_string(),
            event: event.to_string(),
        })
    }
}

fn totals_summary(s: &Session) -> String {
    format!(
        "Active: {} | Breaks: {} | Idle: {}",
        format_secs(s.total_work_secs),
        format_secs(s.total_break_secs),
        format_secs(s.total_idle_secs)
    )
}

fn log_only(
    at: Timestamp,
    kind: EventKind,
    session: Option<&Session>,
    details: &str,
) -> LogEntry {
    LogEntry::new(
        at,
        kind,
        session.map(|s| s.id.as_str()),
        state_of(session),
        details,
    )
}

fn close_entry(at: Timestamp, s: &Session, reason: &str) -> LogEntry {
    LogEntry::new(
        at,
        EventKind::ClockOut,
        Some(&s.id),
        SessionState::ClockedOut,
        format!("{} | {}", reason, totals_summary(s)),
    )
}

/// End an idle suspension at `at`: resume to the pre-idle state, or auto
/// clock-out at the idle start when the interval reached threshold + grace.
fn end_idle(
    mut s: Session,
    at: Timestamp,
    kind: EventKind,
    policy: &Policy,
) -> (Option<Session>, Step) {
    let idle_since = s.idle_since.unwrap_or(s.state_since);
    let idle_secs = (at - idle_since).num_seconds().max(0);

    if idle_secs >= policy.auto_clock_out_secs() {
        s.close(idle_since, CloseReason::IdleTimeout);
        let reason = format!(
            "Auto clock-out: idle {} reached {}s allowance",
            format_secs(idle_secs),
            policy.auto_clock_out_secs()
        );
        let closing = close_entry(idle_since, &s, &reason);
        let returned = LogEntry::new(
            at,
            kind,
            Some(&s.id),
            SessionState::ClockedOut,
            format!(
                "Returned after {}; session closed at {}",
                format_secs(idle_secs),
                local_hms(&idle_since)
            ),
        );
        info!(session = %s.id, idle_secs, "auto clock-out after long idle");
        return (
            None,
            Step {
                entries: vec![closing, returned],
                closed: Some(s),
            },
        );
    }

    let credited = s.resume(at);
    let entry = LogEntry::new(
        at,
        kind,
        Some(&s.id),
        s.state,
        format!(
            "Resumed after idle of {} (total idle {})",
            format_secs(credited),
            format_secs(s.total_idle_secs)
        ),
    );
    (Some(s), Step::entry(entry))
}

/// Apply an already-checked event at effective time `at`.
pub fn apply(
    session: Option<Session>,
    at: Timestamp,
    event: SessionEvent,
    policy: &Policy,
) -> (Option<Session>, Step) {
    match (session, event) {
        // ---------------------------
        // User commands
        // ---------------------------
        (None, SessionEvent::User(UserCommand::ClockIn)) => {
            let s = Session::open(at);
            info!(session = %s.id, "clocked in");
            let entry = LogEntry::new(
                at,
                EventKind::ClockIn,
                Some(&s.id),
                SessionState::Working,
                "Started work session",
            );
            (Some(s), Step::entry(entry))
        }

        (Some(mut s), SessionEvent::User(UserCommand::ClockOut)) => {
            // Without a resume the user was last seen when the idle began.
            let close_at = match s.state {
                SessionState::IdleSuspended => s.idle_since.unwrap_or(s.state_since),
                _ => at,
            };
            s.close(close_at, CloseReason::User);
            info!(session = %s.id, "clocked out");
            let entry = close_entry(close_at, &s, "Manual clock out");
            (
                None,
                Step {
                    entries: vec![entry],
                    closed: Some(s),
                },
            )
        }

        (Some(mut s), SessionEvent::User(UserCommand::BreakStart)) => {
            s.enter(SessionState::OnBreak, at);
            let entry = log_only(at, EventKind::BreakStart, Some(&s), "Started break");
            (Some(s), Step::entry(entry))
        }

        (Some(mut s), SessionEvent::User(UserCommand::BreakEnd)) => {
            s.enter(SessionState::Working, at);
            let details = format!(
                "Resumed work (break total: {})",
                format_secs(s.total_break_secs)
            );
            let entry = log_only(at, EventKind::BreakEnd, Some(&s), &details);
            (Some(s), Step::entry(entry))
        }

        // ---------------------------
        // Idle detector
        // ---------------------------
        (Some(mut s), SessionEvent::Idle(IdleTransition::Idle))
            if matches!(s.state, SessionState::Working | SessionState::OnBreak) =>
        {
            s.suspend(IdleCause::Inactivity, at);
            let details = format!(
                "No activity since {} (threshold {}s)",
                local_hms(&at),
                policy.idle_threshold_secs
            );
            let entry = log_only(at, EventKind::IdleStart, Some(&s), &details);
            (Some(s), Step::entry(entry))
        }

        (Some(s), SessionEvent::Idle(IdleTransition::ActivityResumed))
            if s.state == SessionState::IdleSuspended =>
        {
            end_idle(s, at, EventKind::IdleEnd, policy)
        }

        (session, SessionEvent::Idle(_)) => (session, Step::default()),

        // ---------------------------
        // OS lifecycle
        // ---------------------------
        (Some(mut s), SessionEvent::System(SystemEvent::Sleep))
            if matches!(s.state, SessionState::Working | SessionState::OnBreak) =>
        {
            s.suspend(IdleCause::Sleep, at);
            let entry = log_only(at, EventKind::SystemSleep, Some(&s), "System entering sleep");
            (Some(s), Step::entry(entry))
        }

        (session, SessionEvent::System(SystemEvent::Sleep)) => {
            let entry = log_only(
                at,
                EventKind::SystemSleep,
                session.as_ref(),
                "System entering sleep",
            );
            (session, Step::entry(entry))
        }

        (Some(s), SessionEvent::System(SystemEvent::Resume))
            if s.state == SessionState::IdleSuspended =>
        {
            resume_signal(s, at, EventKind::SystemResume, IdleCause::Sleep, policy)
        }

        (session, SessionEvent::System(SystemEvent::Resume)) => {
            let entry = log_only(
                at,
                EventKind::SystemResume,
                session.as_ref(),
                "System resumed",
            );
            (session, Step::entry(entry))
        }

        (Some(mut s), SessionEvent::System(SystemEvent::Lock))
            if policy.lock_triggers_idle
                && matches!(s.state, SessionState::Working | SessionState::OnBreak) =>
        {
            s.suspend(IdleCause::Lock, at);
            let entry = log_only(at, EventKind::Lock, Some(&s), "Workstation locked");
            (Some(s), Step::entry(entry))
        }

        (session, SessionEvent::System(SystemEvent::Lock)) => {
            let entry = log_only(at, EventKind::Lock, session.as_ref(), "Workstation locked");
            (session, Step::entry(entry))
        }

        (Some(s), SessionEvent::System(SystemEvent::Unlock))
            if policy.lock_triggers_idle && s.state == SessionState::IdleSuspended =>
        {
            resume_signal(s, at, EventKind::Unlock, IdleCause::Lock, policy)
        }

        (session, SessionEvent::System(SystemEvent::Unlock)) => {
            let entry = log_only(
                at,
                EventKind::Unlock,
                session.as_ref(),
                "Workstation unlocked",
            );
            (session, Step::entry(entry))
        }

        (Some(mut s), SessionEvent::System(SystemEvent::ShutdownRequested)) => {
            s.close(at, CloseReason::SystemShutdown);
            info!(session = %s.id, "session force-closed on shutdown");
            let entry = close_entry(at, &s, "System shutdown");
            (
                None,
                Step {
                    entries: vec![entry],
                    closed: Some(s),
                },
            )
        }

        (None, SessionEvent::System(SystemEvent::ShutdownRequested)) => (None, Step::default()),

        // Rejected by `check`; leave everything untouched.
        (session, SessionEvent::User(_)) => (session, Step::default()),
    }
}

/// A resume-type OS signal (wake, unlock) ends the suspension it caused.
/// Against a suspension with another cause it can only trigger the
/// auto clock-out branch; a short interval leaves the session waiting for
/// real activity.
fn resume_signal(
    s: Session,
    at: Timestamp,
    kind: EventKind,
    resolves: IdleCause,
    policy: &Policy,
) -> (Option<Session>, Step) {
    if s.idle_cause == Some(resolves) {
        return end_idle(s, at, kind, policy);
    }

    let idle_since = s.idle_since.unwrap_or(s.state_since);
    if (at - idle_since).num_seconds() >= policy.auto_clock_out_secs() {
        return end_idle(s, at, kind, policy);
    }

    let entry = log_only(at, kind, Some(&s), "Signal received; still idle");
    (Some(s), Step::entry(entry))
}

/// Owner of the single open session.
///
/// Events are applied in timestamp order; an event older than the last
/// applied transition is clamped to it and flagged.
#[derive(Debug, Clone)]
pub struct SessionMachine {
    session: Option<Session>,
    policy: Policy,
    watermark: Option<Timestamp>,
}

impl SessionMachine {
    pub fn new(policy: Policy) -> Self {
        Self {
            session: None,
            policy,
            watermark: None,
        }
    }

    /// Resume with a recovered session. Nothing may be applied before `since`.
    pub fn with_session(session: Option<Session>, policy: Policy, since: Timestamp) -> Self {
        Self {
            session,
            policy,
            watermark: Some(since),
        }
    }

    pub fn state(&self) -> SessionState {
        state_of(self.session.as_ref())
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn set_policy(&mut self, policy: Policy) {
        if policy != self.policy {
            debug!(?policy, "policy updated");
        }
        self.policy = policy;
    }

    pub fn watermark(&self) -> Option<Timestamp> {
        self.watermark
    }

    /// Validate and apply one event. Invalid user commands return
    /// `InvalidTransition` and leave the state untouched.
    pub fn handle(&mut self, ev: QueuedEvent) -> AppResult<Step> {
        check(self.session.as_ref(), &ev.event)?;

        let (at, clamped) = match self.watermark {
            Some(w) if ev.at < w => (w, true),
            _ => (ev.at, false),
        };
        if clamped {
            warn!(
                event = %ev.event,
                event_time = %ev.at,
                applied_at = %at,
                "clock skew: event older than last transition, clamped"
            );
        }

        let (next, mut step) = apply(self.session.take(), at, ev.event, &self.policy);
        self.session = next;

        if !step.is_empty() {
            self.watermark = Some(at);
            debug!(event = %ev.event, state = %self.state(), "transition applied");
        }
        if clamped {
            for entry in &mut step.entries {
                entry.details.push_str(" [clock skew: event time clamped]");
            }
        }

        Ok(step)
    }

    /// Snapshot for the heartbeat file.
    pub fn heartbeat(&self, at: Timestamp) -> Heartbeat {
        Heartbeat::of(at, self.session.as_ref())
    }
}
