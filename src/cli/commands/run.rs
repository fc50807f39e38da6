use crate::cli::commands::recover::print_recovery;
use crate::cli::commands::status::print_state;
use crate::cli::parser::{Cli, Commands};
use crate::config::Config;
use crate::core::idle::IdleDetector;
use crate::core::log::format_entry;
use crate::core::tracker::{Report, Tracker};
use crate::errors::{AppError, AppResult};
use crate::models::{CloseReason, SessionEvent, SessionState, SystemEvent};
use crate::sources::activity::{SharedActivity, TouchFileActivity};
use crate::sources::clock::{Clock, SystemClock};
use crate::sources::poller::{ConfigWatch, Poller};
use crate::sources::stdin::spawn_reader;
use crate::store::FileStore;
use crate::ui::messages::{error, info, warning};
use std::io::{self, BufReader};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn print_report(report: Report<'_>) {
    match report {
        Report::Applied { event, step, state } => {
            for entry in &step.entries {
                println!("{}", format_entry(entry, true));
            }
            if let Some(closed) = &step.closed
                && closed.close_reason == Some(CloseReason::IdleTimeout)
            {
                warning("Idle for too long: the session was closed when the inactivity began.");
            }
            if event == SessionEvent::System(SystemEvent::Resume) && state == SessionState::ClockedOut
            {
                info("System resumed while clocked out. Type 'in' to start a new session.");
            }
        }
        Report::Rejected(e) => warning(e),
        Report::PersistFailed(e @ AppError::RecordsDropped { .. }) => error(e),
        Report::PersistFailed(e) => error(format!("{} (kept in memory, will retry)", e)),
        Report::Status {
            session,
            state,
            now,
            pending_writes,
        } => {
            print_state(session, state, now);
            if pending_writes > 0 {
                warning(format!("{} write(s) not yet durable", pending_writes));
            }
        }
    }
}

/// Handle `run`: recover, then track live input until shutdown.
pub fn handle(cli: &Cli, cfg: &Config) -> AppResult<()> {
    let Commands::Run { activity_file } = &cli.command else {
        return Ok(());
    };

    let mut cfg = cfg.clone();
    if let Some(path) = activity_file {
        cfg.activity_file = Some(path.clone());
    }

    let store = FileStore::open(&cfg)?;
    let clock = SystemClock;
    let (mut tracker, recovery) = Tracker::recover(store, clock, cfg.clone());
    print_recovery(&recovery);

    let now = clock.now();
    let detector = match tracker.session() {
        Some(s) if s.state == SessionState::IdleSuspended => {
            IdleDetector::idle_since(s.idle_since.unwrap_or(s.state_since))
        }
        _ => IdleDetector::new(now),
    };

    let (tx, rx) = crossbeam_channel::unbounded();
    let stop = Arc::new(AtomicBool::new(false));
    let activity = SharedActivity::new(now);
    let watch = ConfigWatch::new(Config::config_file(), cli.data_dir.clone());

    let poller = match cfg.activity_file_path() {
        Some(path) => {
            info(format!("Watching {} for activity", path.display()));
            let source = TouchFileActivity::new(path, activity.clone());
            Poller::new(clock, source, detector, &cfg)
                .with_watch(watch)
                .spawn(tx.clone(), stop.clone())
        }
        None => Poller::new(clock, activity.clone(), detector, &cfg)
            .with_watch(watch)
            .spawn(tx.clone(), stop.clone()),
    };

    // The reader owns the last sender besides the poller's.
    let _reader = spawn_reader(BufReader::new(io::stdin()), clock, activity, tx);

    print_state(tracker.session(), tracker.state(), now);
    info("Tracking. Type 'help' for commands, 'quit' to stop.");

    tracker.run(&rx, print_report);

    stop.store(true, Ordering::SeqCst);
    if poller.join().is_err() {
        warning("Idle poller stopped abnormally.");
    }

    if !tracker.is_durable() {
        error("Some writes could not be persisted; recovery will reconcile them on next start.");
    }
    Ok(())
}
