//! Producers feeding the control loop. None of them touch session state;
//! they only stamp events and send them over the channel.

pub mod activity;
pub mod clock;
pub mod poller;
pub mod stdin;
