use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    ClockedOut,
    Working,
    OnBreak,
    IdleSuspended,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::ClockedOut => "clocked_out",
            SessionState::Working => "working",
            SessionState::OnBreak => "on_break",
            SessionState::IdleSuspended => "idle_suspended",
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, SessionState::ClockedOut)
    }

    /// Short label with icon, used by `status` and the live prompt.
    pub fn badge(&self) -> &'static str {
        match self {
            SessionState::ClockedOut => "⚫ Clocked out",
            SessionState::Working => "🟢 Working",
            SessionState::OnBreak => "🟡 On break",
            SessionState::IdleSuspended => "🟠 Idle",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an IdleSuspended session was suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleCause {
    Inactivity,
    Sleep,
    Lock,
}

/// Why a session was closed. Stored in the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    User,
    IdleTimeout,
    SystemShutdown,
    Recovery,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::User => "user",
            CloseReason::IdleTimeout => "idle_timeout",
            CloseReason::SystemShutdown => "system_shutdown",
            CloseReason::Recovery => "recovery",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(CloseReason::User),
            "idle_timeout" => Some(CloseReason::IdleTimeout),
            "system_shutdown" => Some(CloseReason::SystemShutdown),
            "recovery" => Some(CloseReason::Recovery),
            _ => None,
        }
    }
}
