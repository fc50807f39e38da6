use rworkclock::core::durability::{RetryPolicy, with_retry};
use rworkclock::core::recovery::{RecoveryOutcome, RecoverySource};
use rworkclock::core::tracker::Tracker;
use rworkclock::db::log::load_internal_log;
use rworkclock::db::queries::{count_sessions, load_session};
use rworkclock::errors::AppError;
use rworkclock::models::{
    CloseReason, EventKind, Heartbeat, HeartbeatRead, LogEntry, QueuedEvent, Session,
    SessionState, UserCommand,
};
use rworkclock::sources::clock::ManualClock;
use rworkclock::store::activity_log::ActivityLog;
use rworkclock::store::heartbeat::HeartbeatFile;
use rworkclock::store::record::CSV_HEADERS;
use rworkclock::store::{FileStore, Persistence};
use std::fs::{self, OpenOptions};
use std::io::Write;
use tempfile::TempDir;

mod common;
use common::{t, test_config};

fn entry(at: i64, kind: EventKind, state: SessionState, details: &str) -> LogEntry {
    LogEntry::new(t(at), kind, Some("s1"), state, details)
}

fn log_in(dir: &TempDir) -> ActivityLog {
    ActivityLog::new(
        dir.path().join("activity_log.jsonl"),
        dir.path().join("activity_log.csv"),
    )
}

#[test]
fn activity_log_is_mirrored_to_json_and_csv() {
    let dir = TempDir::new().unwrap();
    let mut log = log_in(&dir);

    log.append(&entry(0, EventKind::ClockIn, SessionState::Working, "Started work session"))
        .unwrap();
    log.append(&entry(60, EventKind::BreakStart, SessionState::OnBreak, "Started break, coffee"))
        .unwrap();

    let json = fs::read_to_string(log.json_path()).unwrap();
    assert_eq!(json.lines().count(), 2);
    assert!(json.lines().next().unwrap().contains("\"CLOCK_IN\""));

    let mut rdr = csv::Reader::from_path(log.csv_path()).unwrap();
    let headers: Vec<String> = rdr.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(headers, CSV_HEADERS);

    let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[1][1], "BREAK_START");
    assert_eq!(&rows[1][3], "on_break");
    assert_eq!(&rows[1][4], "Started break, coffee");
}

#[test]
fn tail_returns_the_last_entries_oldest_first() {
    let dir = TempDir::new().unwrap();
    let mut log = log_in(&dir);
    for i in 0..5 {
        log.append(&entry(i * 10, EventKind::Lock, SessionState::Working, &format!("#{i}")))
            .unwrap();
    }

    let tail = log.tail(2).unwrap();
    let details: Vec<_> = tail.iter().map(|e| e.details.as_str()).collect();
    assert_eq!(details, vec!["#3", "#4"]);
    assert_eq!(tail[1].timestamp, t(40));
    assert_eq!(tail[1].session_id.as_deref(), Some("s1"));
}

#[test]
fn tail_skips_malformed_lines() {
    let dir = TempDir::new().unwrap();
    let mut log = log_in(&dir);
    log.append(&entry(0, EventKind::ClockIn, SessionState::Working, "in"))
        .unwrap();

    // A record cut short by a crash, then a line with a bad timestamp.
    let mut f = OpenOptions::new().append(true).open(log.json_path()).unwrap();
    writeln!(f, "{{\"timestamp\":\"2025-03-10T09:0").unwrap();
    writeln!(
        f,
        "{{\"timestamp\":\"yesterday\",\"event\":\"LOCK\",\"session_id\":\"\",\"state\":\"working\",\"details\":\"\"}}"
    )
    .unwrap();
    drop(f);

    log.append(&entry(30, EventKind::BreakStart, SessionState::OnBreak, "break"))
        .unwrap();

    let tail = log.tail(10).unwrap();
    let kinds: Vec<_> = tail.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![EventKind::ClockIn, EventKind::BreakStart]);
}

#[test]
fn tail_skips_lines_that_are_not_utf8() {
    let dir = TempDir::new().unwrap();
    let mut log = log_in(&dir);
    log.append(&entry(0, EventKind::ClockIn, SessionState::Working, "in"))
        .unwrap();

    // A multibyte character torn in half by a crash.
    let mut f = OpenOptions::new().append(true).open(log.json_path()).unwrap();
    f.write_all(b"{\"timestamp\":\"\xff\xfe\n").unwrap();
    drop(f);

    log.append(&entry(30, EventKind::BreakStart, SessionState::OnBreak, "break"))
        .unwrap();

    let kinds: Vec<_> = log.tail(10).unwrap().iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![EventKind::ClockIn, EventKind::BreakStart]);
}

#[test]
fn append_after_a_torn_final_line_starts_a_new_line() {
    let dir = TempDir::new().unwrap();
    let mut log = log_in(&dir);
    log.append(&entry(0, EventKind::ClockIn, SessionState::Working, "in"))
        .unwrap();

    for path in [log.json_path().to_path_buf(), log.csv_path().to_path_buf()] {
        let mut f = OpenOptions::new().append(true).open(path).unwrap();
        f.write_all(b"{\"timestamp\":\"2025-03").unwrap();
    }

    log.append(&entry(30, EventKind::BreakStart, SessionState::OnBreak, "break"))
        .unwrap();

    let tail = log.tail(10).unwrap();
    let kinds: Vec<_> = tail.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![EventKind::ClockIn, EventKind::BreakStart]);

    let csv = fs::read_to_string(log.csv_path()).unwrap();
    let last = csv.lines().last().unwrap();
    assert!(last.contains("BREAK_START"));
    assert!(last.starts_with("2025-03-10T09:00:30"));
}

#[test]
fn retried_append_only_writes_the_missing_mirror() {
    let dir = TempDir::new().unwrap();
    let mut log = log_in(&dir);
    fs::create_dir(log.csv_path()).unwrap();

    let first = entry(0, EventKind::ClockIn, SessionState::Working, "in");
    let res = with_retry(&RetryPolicy::immediate(5), "log append", || log.append(&first));
    assert!(matches!(res, Err(AppError::PersistenceExhausted { attempts: 5, .. })));
    assert_eq!(fs::read_to_string(log.json_path()).unwrap().lines().count(), 1);

    // The CSV mirror becomes writable again.
    fs::remove_dir(log.csv_path()).unwrap();
    log.append(&first).unwrap();
    log.append(&entry(10, EventKind::BreakStart, SessionState::OnBreak, "break"))
        .unwrap();

    assert_eq!(fs::read_to_string(log.json_path()).unwrap().lines().count(), 2);
    let mut rdr = csv::Reader::from_path(log.csv_path()).unwrap();
    let events: Vec<String> = rdr
        .records()
        .map(|r| r.unwrap()[1].to_string())
        .collect();
    assert_eq!(events, vec!["CLOCK_IN", "BREAK_START"]);
}

#[test]
fn missing_log_reads_as_empty() {
    let dir = TempDir::new().unwrap();
    assert!(log_in(&dir).tail(10).unwrap().is_empty());
}

#[test]
fn heartbeat_file_round_trip_and_corruption() {
    let dir = TempDir::new().unwrap();
    let hb_file = HeartbeatFile::new(dir.path().join("heartbeat.json"));
    assert_eq!(hb_file.read(), HeartbeatRead::Absent);

    let session = Session::with_id("s1", t(0));
    let hb = Heartbeat::of(t(30), Some(&session));
    hb_file.write(&hb).unwrap();
    assert_eq!(hb_file.read(), HeartbeatRead::Present(hb));
    assert!(!dir.path().join("heartbeat.json.tmp").exists());

    fs::write(hb_file.path(), "{\"timestamp\": 12").unwrap();
    assert!(matches!(hb_file.read(), HeartbeatRead::Corrupt(_)));

    fs::write(
        hb_file.path(),
        r#"{"timestamp":"2025-03-10T09:00:00Z","state":"working","session":null}"#,
    )
    .unwrap();
    assert!(matches!(hb_file.read(), HeartbeatRead::Corrupt(_)));
}

#[test]
fn archiving_a_session_twice_keeps_one_row() {
    let dir = TempDir::new().unwrap();
    let mut store = FileStore::open(&test_config(dir.path())).unwrap();

    let mut s = Session::with_id("s1", t(0));
    s.close(t(3600), CloseReason::User);
    store.archive_session(&s).unwrap();
    store.archive_session(&s).unwrap();

    let conn = &store.pool().conn;
    assert_eq!(count_sessions(conn).unwrap(), 1);
    let loaded = load_session(conn, "s1").unwrap().expect("archived row");
    assert_eq!(loaded.clock_out, Some(t(3600)));
    assert_eq!(loaded.total_work_secs, 3600);
    assert_eq!(loaded.close_reason, Some(CloseReason::User));
}

#[test]
fn opening_a_new_store_notes_the_applied_migrations() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::open(&test_config(dir.path())).unwrap();

    let rows = load_internal_log(&store.pool().conn).unwrap();
    assert!(rows.iter().any(|r| r.operation == "migration_applied"));
}

#[test]
fn open_session_cannot_be_archived() {
    let dir = TempDir::new().unwrap();
    let mut store = FileStore::open(&test_config(dir.path())).unwrap();
    assert!(store.archive_session(&Session::with_id("s1", t(0))).is_err());
}

#[test]
fn file_store_survives_a_restart() {
    let dir = TempDir::new().unwrap();
    let cfg = test_config(dir.path());
    let clock = ManualClock::new(t(0));

    let store = FileStore::open(&cfg).unwrap();
    let (mut tracker, recovery) = Tracker::recover(store, clock.clone(), cfg.clone());
    assert_eq!(recovery.outcome, RecoveryOutcome::Fresh);
    tracker
        .dispatch(QueuedEvent::user(t(0), UserCommand::ClockIn))
        .unwrap();
    tracker.tick(t(20)).unwrap();
    let id = tracker.session().unwrap().id.clone();
    drop(tracker);

    clock.set(t(25));
    let store = FileStore::open(&cfg).unwrap();
    let (tracker, recovery) = Tracker::recover(store, clock.clone(), cfg.clone());
    assert_eq!(recovery.outcome, RecoveryOutcome::Resumed);
    assert_eq!(tracker.session().map(|s| s.id.as_str()), Some(id.as_str()));
    drop(tracker);

    clock.set(t(7200));
    let store = FileStore::open(&cfg).unwrap();
    let (tracker, recovery) = Tracker::recover(store, clock, cfg.clone());
    assert_eq!(recovery.outcome, RecoveryOutcome::AutoClosed);

    let conn = &tracker.store().pool().conn;
    let archived = load_session(conn, &id).unwrap().unwrap();
    assert_eq!(archived.close_reason, Some(CloseReason::Recovery));
    // The resume wrote a fresh snapshot at t(25).
    assert_eq!(archived.clock_out, Some(t(25)));

    let kinds: Vec<_> = tracker
        .store()
        .activity_log()
        .tail(10)
        .unwrap()
        .iter()
        .map(|e| e.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::ClockIn,
            EventKind::RecoveredResume,
            EventKind::RecoveredAutoClockOut,
        ]
    );
}

#[test]
fn damaged_heartbeat_and_log_still_recover_the_session() {
    let dir = TempDir::new().unwrap();
    let cfg = test_config(dir.path());

    let mut log = ActivityLog::new(cfg.json_log_path(), cfg.csv_log_path());
    log.append(&entry(0, EventKind::ClockIn, SessionState::Working, "in"))
        .unwrap();
    let mut f = OpenOptions::new().append(true).open(log.json_path()).unwrap();
    f.write_all(b"\xc3\n{\"timestamp\":\"2025-03-10T09:0").unwrap();
    drop(f);
    fs::write(cfg.heartbeat_path(), "{\"timestamp\": ").unwrap();

    let clock = ManualClock::new(t(10));
    let store = FileStore::open(&cfg).unwrap();
    let (tracker, recovery) = Tracker::recover(store, clock.clone(), cfg.clone());
    assert_eq!(recovery.outcome, RecoveryOutcome::Resumed);
    assert_eq!(recovery.source, RecoverySource::LogTail);
    assert_eq!(tracker.state(), SessionState::Working);
    assert_eq!(tracker.session().map(|s| s.id.as_str()), Some("s1"));
    drop(tracker);

    // Gone for two hours: the same session is closed at the last record.
    fs::write(cfg.heartbeat_path(), "garbage").unwrap();
    clock.set(t(7200));
    let store = FileStore::open(&cfg).unwrap();
    let (tracker, recovery) = Tracker::recover(store, clock, cfg.clone());
    assert_eq!(recovery.outcome, RecoveryOutcome::AutoClosed);
    assert_eq!(recovery.source, RecoverySource::LogTail);

    let kinds: Vec<_> = tracker
        .store()
        .activity_log()
        .tail(10)
        .unwrap()
        .iter()
        .map(|e| e.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::ClockIn,
            EventKind::RecoveredResume,
            EventKind::RecoveredAutoClockOut,
        ]
    );
    let archived = load_session(&tracker.store().pool().conn, "s1").unwrap().unwrap();
    assert_eq!(archived.close_reason, Some(CloseReason::Recovery));
    assert_eq!(archived.clock_out, Some(t(10)));
}
