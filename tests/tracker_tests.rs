use chrono::Duration;
use rworkclock::core::recovery::{Recovery, RecoveryOutcome};
use rworkclock::core::tracker::{Inbound, Report, Tracker};
use rworkclock::models::{
    CloseReason, EventKind, Heartbeat, IdleTransition, LogEntry, QueuedEvent, SessionState,
    SystemEvent, UserCommand,
};
use rworkclock::sources::clock::ManualClock;
use rworkclock::store::MemoryStore;
use tempfile::TempDir;

mod common;
use common::{t, test_config};

type TestTracker = Tracker<MemoryStore, ManualClock>;

fn start(store: MemoryStore, clock: &ManualClock) -> (TestTracker, Recovery, TempDir) {
    let dir = TempDir::new().unwrap();
    let (tracker, recovery) = Tracker::recover(store, clock.clone(), test_config(dir.path()));
    (tracker, recovery, dir)
}

#[test]
fn fresh_start_writes_a_clocked_out_heartbeat() {
    let clock = ManualClock::new(t(0));
    let dir = TempDir::new().unwrap();
    let (tracker, recovery) =
        Tracker::recover(MemoryStore::new(), clock, test_config(dir.path()));

    assert_eq!(recovery.outcome, RecoveryOutcome::Fresh);
    assert_eq!(tracker.state(), SessionState::ClockedOut);
    assert!(tracker.is_durable());

    let store = tracker.store();
    assert_eq!(store.heartbeat, Some(Heartbeat::clocked_out(t(0))));
    assert!(store.notes.iter().any(|(op, _, _)| op == "recover"));
}

#[test]
fn each_transition_is_logged_before_the_heartbeat() {
    let clock = ManualClock::new(t(0));
    let (mut tracker, _, _dir) = start(MemoryStore::new(), &clock);

    tracker
        .dispatch(QueuedEvent::user(t(10), UserCommand::ClockIn))
        .unwrap();
    let store = tracker.store();
    assert_eq!(store.log.len(), 1);
    assert_eq!(store.log[0].kind, EventKind::ClockIn);
    let hb = store.heartbeat.as_ref().unwrap();
    assert_eq!(hb.state, SessionState::Working);
    assert_eq!(hb.timestamp, t(10));

    tracker
        .dispatch(QueuedEvent::user(t(3610), UserCommand::ClockOut))
        .unwrap();
    let store = tracker.store();
    assert_eq!(store.archived.len(), 1);
    assert_eq!(store.archived[0].total_work_secs, 3600);
    assert_eq!(store.archived[0].close_reason, Some(CloseReason::User));
    assert_eq!(
        store.heartbeat.as_ref().map(|h| h.state),
        Some(SessionState::ClockedOut)
    );
}

#[test]
fn rejected_command_writes_nothing() {
    let clock = ManualClock::new(t(0));
    let (mut tracker, _, _dir) = start(MemoryStore::new(), &clock);
    let writes = tracker.store().heartbeat_writes;

    assert!(
        tracker
            .dispatch(QueuedEvent::user(t(5), UserCommand::BreakStart))
            .is_err()
    );
    assert!(tracker.store().log.is_empty());
    assert_eq!(tracker.store().heartbeat_writes, writes);
}

#[test]
fn failed_log_append_stays_pending_until_tick() {
    let mut store = MemoryStore::new();
    // Two attempts per write: the first commit gives up, the tick succeeds.
    store.fail_log_appends(3);
    let clock = ManualClock::new(t(0));
    let (mut tracker, _, _dir) = start(store, &clock);

    let step = tracker
        .dispatch(QueuedEvent::user(t(10), UserCommand::ClockIn))
        .expect("transition applies even when the write fails");
    assert_eq!(step.entries.len(), 1);
    assert_eq!(tracker.state(), SessionState::Working);
    assert!(!tracker.is_durable());
    assert!(tracker.last_persist_error().is_some());
    assert!(tracker.store().log.is_empty());

    tracker.tick(t(20)).unwrap();
    assert!(tracker.is_durable());
    assert!(tracker.last_persist_error().is_none());
    assert_eq!(tracker.store().log.len(), 1);
    assert_eq!(
        tracker.store().heartbeat.as_ref().map(|h| h.timestamp),
        Some(t(20))
    );
}

#[test]
fn pending_writes_go_out_in_order() {
    let mut store = MemoryStore::new();
    store.fail_log_appends(2);
    let clock = ManualClock::new(t(0));
    let (mut tracker, _, _dir) = start(store, &clock);

    tracker
        .dispatch(QueuedEvent::user(t(10), UserCommand::ClockIn))
        .unwrap();
    assert!(!tracker.is_durable());
    tracker
        .dispatch(QueuedEvent::user(t(20), UserCommand::BreakStart))
        .unwrap();

    assert!(tracker.is_durable());
    let kinds: Vec<_> = tracker.store().log.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![EventKind::ClockIn, EventKind::BreakStart]);
}

#[test]
fn failed_archive_is_retried() {
    let mut store = MemoryStore::new();
    store.fail_archive_writes(2);
    let clock = ManualClock::new(t(0));
    let (mut tracker, _, _dir) = start(store, &clock);

    tracker
        .dispatch(QueuedEvent::user(t(10), UserCommand::ClockIn))
        .unwrap();
    tracker
        .dispatch(QueuedEvent::user(t(70), UserCommand::ClockOut))
        .unwrap();
    assert!(!tracker.is_durable());
    assert!(tracker.store().archived.is_empty());

    tracker.tick(t(80)).unwrap();
    assert!(tracker.is_durable());
    assert_eq!(tracker.store().archived.len(), 1);
}

#[test]
fn heartbeat_refresh_only_while_running() {
    let clock = ManualClock::new(t(0));
    let (mut tracker, _, _dir) = start(MemoryStore::new(), &clock);
    let before = tracker.store().heartbeat_writes;

    tracker.tick(t(5)).unwrap();
    assert_eq!(tracker.store().heartbeat_writes, before);

    tracker
        .dispatch(QueuedEvent::user(t(10), UserCommand::ClockIn))
        .unwrap();
    tracker.tick(t(15)).unwrap();
    assert_eq!(tracker.store().heartbeat_writes, before + 2);
    assert_eq!(
        tracker.store().heartbeat.as_ref().map(|h| h.timestamp),
        Some(t(15))
    );
}

#[test]
fn crash_and_quick_restart_resumes_same_session() {
    let clock = ManualClock::new(t(0));
    let (mut tracker, _, _dir) = start(MemoryStore::new(), &clock);
    tracker
        .dispatch(QueuedEvent::user(t(0), UserCommand::ClockIn))
        .unwrap();
    tracker.tick(t(30)).unwrap();
    let id = tracker.session().unwrap().id.clone();

    // Crash: only what reached the store survives.
    let store = tracker.into_store();
    clock.set(t(35));
    let (tracker, recovery, _dir) = start(store, &clock);

    assert_eq!(recovery.outcome, RecoveryOutcome::Resumed);
    assert_eq!(tracker.session().map(|s| s.id.clone()), Some(id));
    assert_eq!(tracker.state(), SessionState::Working);
    assert_eq!(
        tracker.store().log.last().map(|e| e.kind),
        Some(EventKind::RecoveredResume)
    );
}

#[test]
fn crash_and_late_restart_closes_at_last_heartbeat() {
    let clock = ManualClock::new(t(0));
    let (mut tracker, _, _dir) = start(MemoryStore::new(), &clock);
    tracker
        .dispatch(QueuedEvent::user(t(0), UserCommand::ClockIn))
        .unwrap();
    tracker.tick(t(30)).unwrap();

    let store = tracker.into_store();
    clock.advance(Duration::hours(2));
    let (tracker, recovery, _dir) = start(store, &clock);

    assert_eq!(recovery.outcome, RecoveryOutcome::AutoClosed);
    assert_eq!(tracker.state(), SessionState::ClockedOut);

    let archived = &tracker.store().archived;
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].clock_out, Some(t(30)));
    assert_eq!(archived[0].total_work_secs, 30);
    assert_eq!(archived[0].close_reason, Some(CloseReason::Recovery));
}

#[test]
fn clock_in_missing_from_heartbeat_is_recovered_from_log() {
    let mut store = MemoryStore::with_heartbeat(Heartbeat::clocked_out(t(0)));
    store.log.push(LogEntry::new(
        t(10),
        EventKind::ClockIn,
        Some("lost"),
        SessionState::Working,
        "Started work session",
    ));
    let clock = ManualClock::new(t(20));
    let (tracker, recovery, _dir) = start(store, &clock);

    assert_eq!(recovery.outcome, RecoveryOutcome::Resumed);
    assert_eq!(tracker.session().map(|s| s.id.as_str()), Some("lost"));
}

#[test]
fn corrupt_heartbeat_is_rewritten_by_recovery() {
    let mut store = MemoryStore::new();
    store.corrupt_heartbeat = Some("truncated".into());
    let clock = ManualClock::new(t(0));
    let (tracker, recovery, _dir) = start(store, &clock);

    assert_eq!(recovery.outcome, RecoveryOutcome::Fresh);
    assert!(tracker.store().corrupt_heartbeat.is_none());
    assert!(tracker.store().heartbeat.is_some());
}

#[test]
fn process_applies_batch_in_timestamp_order() {
    let clock = ManualClock::new(t(0));
    let (mut tracker, _, _dir) = start(MemoryStore::new(), &clock);

    tracker.submit(QueuedEvent::user(t(20), UserCommand::BreakStart));
    tracker.submit(QueuedEvent::user(t(10), UserCommand::ClockIn));
    tracker.submit(QueuedEvent::user(t(30), UserCommand::BreakStart));

    let mut seen = Vec::new();
    let mut report = |r: Report<'_>| match r {
        Report::Applied { event, state, .. } => seen.push(format!("{event} -> {state}")),
        Report::Rejected(_) => seen.push("rejected".to_string()),
        _ => {}
    };
    tracker.process(&mut report);

    assert_eq!(
        seen,
        vec![
            "clock-in -> working".to_string(),
            "break-start -> on_break".to_string(),
            "rejected".to_string(),
        ]
    );
}

#[test]
fn run_stops_on_shutdown_and_closes_the_session() {
    let clock = ManualClock::new(t(0));
    let (mut tracker, _, _dir) = start(MemoryStore::new(), &clock);
    let (tx, rx) = crossbeam_channel::unbounded();

    tx.send(Inbound::Event(QueuedEvent::user(t(0), UserCommand::ClockIn)))
        .unwrap();
    tx.send(Inbound::Status).unwrap();
    tx.send(Inbound::Event(QueuedEvent::system(
        t(60),
        SystemEvent::ShutdownRequested,
    )))
    .unwrap();

    let mut statuses = 0;
    tracker.run(&rx, |r| {
        if let Report::Status { .. } = r {
            statuses += 1;
        }
    });

    assert_eq!(statuses, 1);
    assert_eq!(tracker.state(), SessionState::ClockedOut);
    let archived = &tracker.store().archived;
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].close_reason, Some(CloseReason::SystemShutdown));
    assert_eq!(archived[0].clock_out, Some(t(60)));
}

#[test]
fn run_shuts_down_when_producers_hang_up() {
    let clock = ManualClock::new(t(0));
    let (mut tracker, _, _dir) = start(MemoryStore::new(), &clock);
    let (tx, rx) = crossbeam_channel::unbounded();

    tx.send(Inbound::Event(QueuedEvent::user(t(0), UserCommand::ClockIn)))
        .unwrap();
    drop(tx);

    clock.set(t(90));
    tracker.run(&rx, |_| {});

    let archived = &tracker.store().archived;
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].clock_out, Some(t(90)));
}

#[test]
fn reconfigure_changes_the_auto_clock_out_allowance() {
    let clock = ManualClock::new(t(0));
    let (mut tracker, _, dir) = start(MemoryStore::new(), &clock);

    let mut cfg = test_config(dir.path());
    cfg.idle_threshold_seconds = 600;
    cfg.recovery_grace_margin_seconds = Some(600);
    tracker.reconfigure(cfg);

    tracker
        .dispatch(QueuedEvent::user(t(0), UserCommand::ClockIn))
        .unwrap();
    tracker
        .dispatch(QueuedEvent::idle(t(10), IdleTransition::Idle))
        .unwrap();
    let step = tracker
        .dispatch(QueuedEvent::idle(t(500), IdleTransition::ActivityResumed))
        .unwrap();

    assert!(step.closed.is_none());
    assert_eq!(tracker.state(), SessionState::Working);
    assert_eq!(tracker.config().idle_threshold_seconds, 600);
}

#[test]
fn unwritten_recovery_heartbeat_is_written_with_the_next_transition() {
    let mut store = MemoryStore::new();
    store.fail_heartbeat_writes(2);
    let clock = ManualClock::new(t(0));
    let (mut tracker, _, _dir) = start(store, &clock);

    assert!(!tracker.is_durable());
    assert!(tracker.store().heartbeat.is_none());

    tracker
        .dispatch(QueuedEvent::user(t(5), UserCommand::ClockIn))
        .unwrap();
    assert!(tracker.is_durable());
    assert_eq!(
        tracker.store().heartbeat.as_ref().map(|h| h.state),
        Some(SessionState::Working)
    );
}
