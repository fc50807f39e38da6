//! Startup reconciliation of the persisted snapshot with the activity log.
//!
//! Runs once, before any live event is accepted. Every path that finds an
//! interrupted session produces an explicit log entry; time after the last
//! confirmed snapshot is never credited when the absence was long.

use crate::core::machine::Policy;
use crate::models::{
    CloseReason, EventKind, Heartbeat, HeartbeatRead, IdleCause, LogEntry, Session, SessionState,
    Timestamp,
};
use crate::utils::time::{format_secs, local_string};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Nothing was open; the tracker starts clocked out.
    Fresh,
    /// The open session continues in its recorded state.
    Resumed,
    /// The open session was closed at the last confirmed instant.
    AutoClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySource {
    Heartbeat,
    LogTail,
    Nothing,
}

impl RecoverySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoverySource::Heartbeat => "heartbeat",
            RecoverySource::LogTail => "log tail",
            RecoverySource::Nothing => "nothing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recovery {
    pub outcome: RecoveryOutcome,
    pub source: RecoverySource,
    /// Session the live machine starts with.
    pub session: Option<Session>,
    /// Session closed by this recovery, to be archived.
    pub closed: Option<Session>,
    /// Entries to append, in timestamp order.
    pub entries: Vec<LogEntry>,
    /// Snapshot to write once the entries are durable.
    pub heartbeat: Heartbeat,
    /// No live event may be applied before this instant.
    pub since: Timestamp,
    /// Absence measured from the snapshot (clamped at zero).
    pub gap_secs: Option<i64>,
    pub clock_skew: bool,
    /// Why the heartbeat was not used, when it wasn't.
    pub note: Option<String>,
}

impl Recovery {
    fn fresh(now: Timestamp, source: RecoverySource, note: Option<String>) -> Self {
        Self {
            outcome: RecoveryOutcome::Fresh,
            source,
            session: None,
            closed: None,
            entries: Vec::new(),
            heartbeat: Heartbeat::clocked_out(now),
            since: now,
            gap_secs: None,
            clock_skew: false,
            note,
        }
    }
}

/// A heartbeat is stale when the log holds a transition it never saw: the
/// log append happens first, so a crash in between leaves the log ahead.
pub fn is_stale(heartbeat: &Heartbeat, tail: &[LogEntry]) -> bool {
    match tail.last() {
        Some(last) => {
            last.timestamp > heartbeat.timestamp
                || (last.timestamp == heartbeat.timestamp && last.state != heartbeat.state)
        }
        None => false,
    }
}

fn cause_of(kind: EventKind) -> IdleCause {
    match kind {
        EventKind::SystemSleep => IdleCause::Sleep,
        EventKind::Lock => IdleCause::Lock,
        _ => IdleCause::Inactivity,
    }
}

fn replay_entry(s: &mut Session, e: &LogEntry) {
    if e.state == s.state {
        return;
    }
    match e.state {
        SessionState::ClockedOut => {
            s.close(e.timestamp, CloseReason::User);
        }
        SessionState::IdleSuspended => s.suspend(cause_of(e.kind), e.timestamp),
        target => {
            if s.state == SessionState::IdleSuspended {
                s.resume_to = Some(target);
                s.resume(e.timestamp);
            } else {
                s.enter(target, e.timestamp);
            }
        }
    }
}

/// Rebuild the open session `session_id` from log entries.
///
/// Segment accounting runs between consecutive entries of that session; when
/// the ClockIn line is no longer in `entries`, the first entry found is taken
/// as the clock-in. Returns `None` if the session is unknown or closed.
pub fn replay(entries: &[LogEntry], session_id: &str) -> Option<Session> {
    let mut own = entries
        .iter()
        .filter(|e| e.session_id.as_deref() == Some(session_id));

    let first = own.next()?;
    let mut session = Session::with_id(session_id, first.timestamp);
    replay_entry(&mut session, first);
    for e in own {
        replay_entry(&mut session, e);
        if session.is_closed() {
            return None;
        }
    }

    (!session.is_closed()).then_some(session)
}

/// Decide how the state machine starts.
pub fn reconcile(
    read: HeartbeatRead,
    tail: &[LogEntry],
    now: Timestamp,
    policy: &Policy,
) -> Recovery {
    let (snapshot_at, session, source, note) = match read {
        HeartbeatRead::Absent => {
            debug!("no heartbeat; starting clocked out");
            return Recovery::fresh(now, RecoverySource::Nothing, None);
        }

        HeartbeatRead::Present(hb) if !is_stale(&hb, tail) => {
            match hb.session {
                Some(s) if hb.state.is_open() => (hb.timestamp, s, RecoverySource::Heartbeat, None),
                _ => {
                    debug!("heartbeat says clocked out; starting fresh");
                    return Recovery::fresh(now, RecoverySource::Heartbeat, None);
                }
            }
        }

        HeartbeatRead::Present(hb) => {
            let note = format!(
                "heartbeat from {} is older than the activity log",
                local_string(&hb.timestamp)
            );
            warn!("{}; following the log", note);
            match from_log(tail, now, note) {
                Ok(found) => found,
                Err(recovery) => return *recovery,
            }
        }

        HeartbeatRead::Corrupt(reason) => {
            warn!(%reason, "heartbeat unusable; falling back to the activity log");
            match from_log(tail, now, reason) {
                Ok(found) => found,
                Err(recovery) => return *recovery,
            }
        }
    };

    let raw_gap = (now - snapshot_at).num_seconds();
    let clock_skew = raw_gap < 0;
    let gap = raw_gap.max(0);
    if clock_skew {
        warn!(
            snapshot = %snapshot_at,
            now = %now,
            "clock skew: snapshot is in the future, gap clamped to zero"
        );
    }
    let skew_flag = if clock_skew {
        " [clock skew: negative gap clamped]"
    } else {
        ""
    };
    let at = now.max(snapshot_at);

    if gap < policy.idle_threshold_secs as i64 {
        info!(session = %session.id, gap, state = %session.state, "session resumed after restart");
        let entry = LogEntry::new(
            at,
            EventKind::RecoveredResume,
            Some(&session.id),
            session.state,
            format!(
                "Recovered from {} after {} absence; resuming {}{}",
                source.as_str(),
                format_secs(gap),
                session.state,
                skew_flag
            ),
        );
        return Recovery {
            outcome: RecoveryOutcome::Resumed,
            source,
            heartbeat: Heartbeat::of(at, Some(&session)),
            session: Some(session),
            closed: None,
            entries: vec![entry],
            since: at,
            gap_secs: Some(gap),
            clock_skew,
            note,
        };
    }

    let mut closed = session;
    closed.close(snapshot_at, CloseReason::Recovery);
    let close_at = closed.clock_out.unwrap_or(snapshot_at);
    info!(session = %closed.id, gap, "session auto-closed after long absence");
    let entry = LogEntry::new(
        close_at,
        EventKind::RecoveredAutoClockOut,
        Some(&closed.id),
        SessionState::ClockedOut,
        format!(
            "Recovered from {} after {} absence; session closed at {} | Active: {} | Breaks: {} | Idle: {}{}",
            source.as_str(),
            format_secs(gap),
            local_string(&close_at),
            format_secs(closed.total_work_secs),
            format_secs(closed.total_break_secs),
            format_secs(closed.total_idle_secs),
            skew_flag
        ),
    );

    Recovery {
        outcome: RecoveryOutcome::AutoClosed,
        source,
        session: None,
        closed: Some(closed),
        entries: vec![entry],
        heartbeat: Heartbeat::clocked_out(at),
        since: at,
        gap_secs: Some(gap),
        clock_skew,
        note,
    }
}

type Found = (Timestamp, Session, RecoverySource, Option<String>);

/// The last well-formed log entry stands in for the heartbeat.
fn from_log(tail: &[LogEntry], now: Timestamp, note: String) -> Result<Found, Box<Recovery>> {
    let Some(last) = tail.last() else {
        return Err(Box::new(Recovery::fresh(
            now,
            RecoverySource::Nothing,
            Some(note),
        )));
    };

    if !last.state.is_open() {
        return Err(Box::new(Recovery::fresh(
            now,
            RecoverySource::LogTail,
            Some(note),
        )));
    }

    let rebuilt = last
        .session_id
        .as_deref()
        .and_then(|id| replay(tail, id));

    match rebuilt {
        Some(session) => Ok((last.timestamp, session, RecoverySource::LogTail, Some(note))),
        None => {
            warn!("last log entry has no replayable session; starting clocked out");
            Err(Box::new(Recovery::fresh(
                now,
                RecoverySource::LogTail,
                Some(note),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn t(secs: i64) -> Timestamp {
        Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn entry(at: i64, kind: EventKind, state: SessionState) -> LogEntry {
        LogEntry::new(t(at), kind, Some("s1"), state, "")
    }

    #[test]
    fn replay_accounts_segments_between_entries() {
        let log = vec![
            entry(0, EventKind::ClockIn, SessionState::Working),
            entry(600, EventKind::BreakStart, SessionState::OnBreak),
            entry(900, EventKind::BreakEnd, SessionState::Working),
            entry(1000, EventKind::IdleStart, SessionState::IdleSuspended),
        ];
        let s = replay(&log, "s1").unwrap();
        assert_eq!(s.clock_in, t(0));
        assert_eq!(s.state, SessionState::IdleSuspended);
        assert_eq!(s.total_work_secs, 700);
        assert_eq!(s.total_break_secs, 300);
        assert_eq!(s.idle_since, Some(t(1000)));
    }

    #[test]
    fn replay_without_clock_in_starts_at_first_entry() {
        let log = vec![
            entry(100, EventKind::BreakStart, SessionState::OnBreak),
            entry(160, EventKind::BreakEnd, SessionState::Working),
        ];
        let s = replay(&log, "s1").unwrap();
        assert_eq!(s.clock_in, t(100));
        assert_eq!(s.total_break_secs, 60);
        assert_eq!(s.state, SessionState::Working);
    }

    #[test]
    fn replay_of_closed_session_is_none() {
        let log = vec![
            entry(0, EventKind::ClockIn, SessionState::Working),
            entry(10, EventKind::ClockOut, SessionState::ClockedOut),
        ];
        assert!(replay(&log, "s1").is_none());
        assert!(replay(&log, "other").is_none());
    }

    #[test]
    fn stale_when_log_is_newer() {
        let hb = Heartbeat::clocked_out(t(0));
        assert!(is_stale(&hb, &[entry(5, EventKind::ClockIn, SessionState::Working)]));
        assert!(is_stale(&hb, &[entry(0, EventKind::ClockIn, SessionState::Working)]));
        assert!(!is_stale(&hb, &[entry(0, EventKind::ClockOut, SessionState::ClockedOut)]));
        assert!(!is_stale(&hb, &[]));
    }
}
