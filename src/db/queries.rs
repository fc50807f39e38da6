use crate::errors::{AppError, AppResult};
use crate::models::{CloseReason, Session, SessionState};
use crate::utils::time::parse_rfc3339;
use chrono::{Local, NaiveDate};
use rusqlite::{Connection, Result, Row, params};

/// Archive a closed session. The archive is immutable: archiving the same
/// session id twice keeps the first row. Returns whether a row was inserted.
pub fn archive_session(conn: &Connection, s: &Session) -> AppResult<bool> {
    let (Some(clock_out), Some(reason)) = (s.clock_out, s.close_reason) else {
        return Err(AppError::CorruptState(format!(
            "session {} is still open and cannot be archived",
            s.id
        )));
    };

    let day = s.clock_in.with_timezone(&Local).date_naive().to_string();
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO sessions
            (id, clock_in, clock_out, work_secs, break_secs, idle_secs, close_reason, created_at, day)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            s.id,
            s.clock_in.to_rfc3339(),
            clock_out.to_rfc3339(),
            s.total_work_secs,
            s.total_break_secs,
            s.total_idle_secs,
            reason.as_str(),
            Local::now().to_rfc3339(),
            day,
        ],
    )?;

    Ok(inserted == 1)
}

fn conversion_error(msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(AppError::CorruptState(msg)),
    )
}

pub fn map_row(row: &Row) -> Result<Session> {
    let clock_in_str: String = row.get("clock_in")?;
    let clock_out_str: String = row.get("clock_out")?;

    let clock_in = parse_rfc3339(&clock_in_str)
        .map_err(|_| conversion_error(format!("bad clock_in '{}'", clock_in_str)))?;
    let clock_out = parse_rfc3339(&clock_out_str)
        .map_err(|_| conversion_error(format!("bad clock_out '{}'", clock_out_str)))?;

    let reason_str: String = row.get("close_reason")?;
    let reason = CloseReason::from_db_str(&reason_str)
        .ok_or_else(|| conversion_error(format!("Invalid close reason: {}", reason_str)))?;

    Ok(Session {
        id: row.get("id")?,
        clock_in,
        clock_out: Some(clock_out),
        total_work_secs: row.get("work_secs")?,
        total_break_secs: row.get("break_secs")?,
        total_idle_secs: row.get("idle_secs")?,
        state: SessionState::ClockedOut,
        state_since: clock_out,
        idle_since: None,
        idle_cause: None,
        resume_to: None,
        close_reason: Some(reason),
    })
}

/// Archived sessions whose local clock-in day falls in `range` (inclusive),
/// or all of them, ordered by clock-in.
pub fn load_sessions(
    conn: &Connection,
    range: Option<(NaiveDate, NaiveDate)>,
) -> AppResult<Vec<Session>> {
    let mut out = Vec::new();

    match range {
        Some((from, to)) => {
            let mut stmt = conn.prepare_cached(
                "SELECT * FROM sessions
                 WHERE day BETWEEN ?1 AND ?2
                 ORDER BY clock_in ASC",
            )?;
            let rows = stmt.query_map(params![from.to_string(), to.to_string()], map_row)?;
            for r in rows {
                out.push(r?);
            }
        }
        None => {
            let mut stmt = conn.prepare_cached("SELECT * FROM sessions ORDER BY clock_in ASC")?;
            let rows = stmt.query_map([], map_row)?;
            for r in rows {
                out.push(r?);
            }
        }
    }

    Ok(out)
}

pub fn load_session(conn: &Connection, id: &str) -> AppResult<Option<Session>> {
    let mut stmt = conn.prepare_cached("SELECT * FROM sessions WHERE id = ?1")?;
    let mut rows = stmt.query_map([id], map_row)?;
    match rows.next() {
        Some(r) => Ok(Some(r?)),
        None => Ok(None),
    }
}

pub fn count_sessions(conn: &Connection) -> AppResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?)
}
