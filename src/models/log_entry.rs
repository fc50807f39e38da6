use super::Timestamp;
use super::session_state::SessionState;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    ClockIn,
    ClockOut,
    BreakStart,
    BreakEnd,
    IdleStart,
    IdleEnd,
    SystemSleep,
    SystemResume,
    Lock,
    Unlock,
    RecoveredAutoClockOut,
    RecoveredResume,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ClockIn => "CLOCK_IN",
            EventKind::ClockOut => "CLOCK_OUT",
            EventKind::BreakStart => "BREAK_START",
            EventKind::BreakEnd => "BREAK_END",
            EventKind::IdleStart => "IDLE_START",
            EventKind::IdleEnd => "IDLE_END",
            EventKind::SystemSleep => "SYSTEM_SLEEP",
            EventKind::SystemResume => "SYSTEM_RESUME",
            EventKind::Lock => "LOCK",
            EventKind::Unlock => "UNLOCK",
            EventKind::RecoveredAutoClockOut => "RECOVERED_AUTO_CLOCK_OUT",
            EventKind::RecoveredResume => "RECOVERED_RESUME",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable line of the activity log.
///
/// `state` is the session state right after the event; it lets the
/// reconciler rebuild a session from the log when the heartbeat is unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: Timestamp,
    pub kind: EventKind,
    pub session_id: Option<String>,
    pub state: SessionState,
    pub details: String,
}

impl LogEntry {
    pub fn new(
        timestamp: Timestamp,
        kind: EventKind,
        session_id: Option<&str>,
        state: SessionState,
        details: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            kind,
            session_id: session_id.map(str::to_string),
            state,
            details: details.into(),
        }
    }
}
