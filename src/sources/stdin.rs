//! Line-oriented operator input for `run`.
//!
//! User commands and simulated OS notifications share one reader; every
//! line becomes an [`Inbound`] message stamped with the reader's clock.

use crate::core::tracker::Inbound;
use crate::errors::{AppError, AppResult};
use crate::models::{QueuedEvent, SystemEvent, Timestamp, UserCommand};
use crate::sources::activity::SharedActivity;
use crate::sources::clock::Clock;
use crate::ui::messages::warning;
use crossbeam_channel::Sender;
use std::io::BufRead;
use std::thread::{self, JoinHandle};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    User(UserCommand),
    System(SystemEvent),
    /// Keyboard/mouse activity reported by hand.
    Activity,
    Status,
    Help,
    Empty,
}

impl Input {
    /// Typing a user command is itself activity.
    pub fn is_activity(&self) -> bool {
        matches!(self, Input::User(_) | Input::Activity | Input::Status)
    }
}

pub const HELP: &str = "\
Commands:
  in | out            clock in / clock out
  break | resume      start / end a break
  activity            report keyboard/mouse activity
  sleep | wake        system sleep / resume
  lock | unlock       workstation lock / unlock
  status              current state and durations
  shutdown | quit     close the session and exit (also on end of input)";

pub fn parse_line(line: &str) -> AppResult<Input> {
    let word = line.trim().to_ascii_lowercase();
    let input = match word.as_str() {
        "" => Input::Empty,
        "in" | "clock-in" => Input::User(UserCommand::ClockIn),
        "out" | "clock-out" => Input::User(UserCommand::ClockOut),
        "break" => Input::User(UserCommand::BreakStart),
        "resume" | "back" => Input::User(UserCommand::BreakEnd),
        "activity" | "a" => Input::Activity,
        "sleep" => Input::System(SystemEvent::Sleep),
        "wake" => Input::System(SystemEvent::Resume),
        "lock" => Input::System(SystemEvent::Lock),
        "unlock" => Input::System(SystemEvent::Unlock),
        "shutdown" | "quit" | "exit" => Input::System(SystemEvent::ShutdownRequested),
        "status" | "s" => Input::Status,
        "help" | "?" => Input::Help,
        other => return Err(AppError::InvalidCommand(other.to_string())),
    };
    Ok(input)
}

/// The message a parsed line turns into, if any.
pub fn to_inbound(input: Input, at: Timestamp) -> Option<Inbound> {
    match input {
        Input::User(cmd) => Some(Inbound::Event(QueuedEvent::user(at, cmd))),
        Input::System(ev) => Some(Inbound::Event(QueuedEvent::system(at, ev))),
        Input::Status => Some(Inbound::Status),
        Input::Activity | Input::Help | Input::Empty => None,
    }
}

/// Read lines until end of input or a shutdown command. End of input is a
/// shutdown request.
pub fn spawn_reader<R, C>(
    reader: R,
    clock: C,
    activity: SharedActivity,
    tx: Sender<Inbound>,
) -> JoinHandle<()>
where
    R: BufRead + Send + 'static,
    C: Clock + 'static,
{
    thread::spawn(move || {
        for line in reader.lines() {
            let Ok(line) = line else { break };
            let at = clock.now();

            let input = match parse_line(&line) {
                Ok(input) => input,
                Err(e) => {
                    warning(format!("{} (type 'help')", e));
                    continue;
                }
            };

            if input.is_activity() {
                activity.record(at);
            }
            if input == Input::Help {
                println!("{}", HELP);
            }

            let shutdown = input == Input::System(SystemEvent::ShutdownRequested);
            if let Some(msg) = to_inbound(input, at)
                && tx.send(msg).is_err()
            {
                return;
            }
            if shutdown {
                return;
            }
        }

        debug!("end of input; requesting shutdown");
        let _ = tx.send(Inbound::Event(QueuedEvent::system(
            clock.now(),
            SystemEvent::ShutdownRequested,
        )));
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_case_insensitively() {
        assert_eq!(
            parse_line(" IN ").unwrap(),
            Input::User(UserCommand::ClockIn)
        );
        assert_eq!(
            parse_line("wake").unwrap(),
            Input::System(SystemEvent::Resume)
        );
        assert_eq!(parse_line("").unwrap(), Input::Empty);
        assert!(matches!(
            parse_line("dance"),
            Err(AppError::InvalidCommand(_))
        ));
    }
}
