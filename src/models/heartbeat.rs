use super::Timestamp;
use super::session::Session;
use super::session_state::SessionState;
use serde::{Deserialize, Serialize};

/// Latest durable snapshot of the tracker, overwritten on every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub timestamp: Timestamp,
    pub state: SessionState,
    /// The open session, if any. Closed sessions live in the archive.
    #[serde(default)]
    pub session: Option<Session>,
}

impl Heartbeat {
    pub fn clocked_out(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            state: SessionState::ClockedOut,
            session: None,
        }
    }

    pub fn of(timestamp: Timestamp, session: Option<&Session>) -> Self {
        match session {
            Some(s) if !s.is_closed() => Self {
                timestamp,
                state: s.state,
                session: Some(s.clone()),
            },
            _ => Self::clocked_out(timestamp),
        }
    }
}

/// Result of reading the heartbeat file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatRead {
    Present(Heartbeat),
    Absent,
    Corrupt(String),
}
