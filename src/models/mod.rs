//! Domain models shared by the core, the stores and the CLI.

use chrono::{DateTime, Utc};

pub mod event;
pub mod heartbeat;
pub mod log_entry;
pub mod session;
pub mod session_state;

/// Second-granularity wall-clock instant.
pub type Timestamp = DateTime<Utc>;

pub use event::{IdleTransition, QueuedEvent, SessionEvent, SystemEvent, UserCommand};
pub use heartbeat::{Heartbeat, HeartbeatRead};
pub use log_entry::{EventKind, LogEntry};
pub use session::{Session, SessionTotals};
pub use session_state::{CloseReason, IdleCause, SessionState};
