//! Session core: idle detection, the state machine, startup recovery and
//! the control loop tying them to durable storage.

pub mod durability;
pub mod idle;
pub mod log;
pub mod machine;
pub mod queue;
pub mod recovery;
pub mod tracker;
