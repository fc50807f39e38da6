use super::Timestamp;
use std::fmt;

/// Commands issued directly by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    ClockIn,
    ClockOut,
    BreakStart,
    BreakEnd,
}

/// Edge-triggered output of the idle detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleTransition {
    /// The event timestamp is the last known activity, not the poll time.
    Idle,
    ActivityResumed,
}

/// Discrete OS lifecycle notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEvent {
    Sleep,
    Resume,
    Lock,
    Unlock,
    ShutdownRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    User(UserCommand),
    Idle(IdleTransition),
    System(SystemEvent),
}

impl SessionEvent {
    /// Tie-break for events sharing a timestamp: lower runs first.
    /// OS lifecycle > idle detector > user commands.
    pub fn priority(&self) -> u8 {
        match self {
            SessionEvent::System(_) => 0,
            SessionEvent::Idle(_) => 1,
            SessionEvent::User(_) => 2,
        }
    }
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionEvent::User(UserCommand::ClockIn) => "clock-in",
            SessionEvent::User(UserCommand::ClockOut) => "clock-out",
            SessionEvent::User(UserCommand::BreakStart) => "break-start",
            SessionEvent::User(UserCommand::BreakEnd) => "break-end",
            SessionEvent::Idle(IdleTransition::Idle) => "idle",
            SessionEvent::Idle(IdleTransition::ActivityResumed) => "activity-resumed",
            SessionEvent::System(SystemEvent::Sleep) => "system-sleep",
            SessionEvent::System(SystemEvent::Resume) => "system-resume",
            SessionEvent::System(SystemEvent::Lock) => "lock",
            SessionEvent::System(SystemEvent::Unlock) => "unlock",
            SessionEvent::System(SystemEvent::ShutdownRequested) => "shutdown-requested",
        };
        f.write_str(label)
    }
}

/// An event stamped with its logical time, as it travels through the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuedEvent {
    pub at: Timestamp,
    pub event: SessionEvent,
}

impl QueuedEvent {
    pub fn new(at: Timestamp, event: SessionEvent) -> Self {
        Self { at, event }
    }

    pub fn user(at: Timestamp, cmd: UserCommand) -> Self {
        Self::new(at, SessionEvent::User(cmd))
    }

    pub fn idle(at: Timestamp, transition: IdleTransition) -> Self {
        Self::new(at, SessionEvent::Idle(transition))
    }

    pub fn system(at: Timestamp, ev: SystemEvent) -> Self {
        Self::new(at, SessionEvent::System(ev))
    }
}
