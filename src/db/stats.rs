use crate::db::pool::DbPool;
use crate::errors::AppResult;
use crate::utils::colors::{CYAN, GREEN, GREY, RESET, YELLOW};
use crate::utils::formatting::secs2readable;
use chrono::NaiveDate;
use rusqlite::OptionalExtension;
use std::fs;
use std::path::Path;

/// Aggregates over the session archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    pub sessions: i64,
    pub first_day: Option<String>,
    pub last_day: Option<String>,
    pub work_secs: i64,
    pub break_secs: i64,
    pub idle_secs: i64,
    pub auto_closed: i64,
}

pub fn archive_stats(pool: &DbPool) -> AppResult<ArchiveStats> {
    let conn = &pool.conn;

    let (sessions, work_secs, break_secs, idle_secs): (i64, i64, i64, i64) = conn.query_row(
        "SELECT COUNT(*),
                IFNULL(SUM(work_secs), 0),
                IFNULL(SUM(break_secs), 0),
                IFNULL(SUM(idle_secs), 0)
         FROM sessions",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
    )?;

    let auto_closed: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sessions WHERE close_reason <> 'user'",
        [],
        |row| row.get(0),
    )?;

    let first_day: Option<String> = conn
        .query_row("SELECT MIN(day) FROM sessions", [], |row| {
            row.get::<_, Option<String>>(0)
        })
        .optional()?
        .flatten();
    let last_day: Option<String> = conn
        .query_row("SELECT MAX(day) FROM sessions", [], |row| {
            row.get::<_, Option<String>>(0)
        })
        .optional()?
        .flatten();

    Ok(ArchiveStats {
        sessions,
        first_day,
        last_day,
        work_secs,
        break_secs,
        idle_secs,
        auto_closed,
    })
}

pub fn print_db_info(pool: &DbPool, db_path: &Path) -> AppResult<()> {
    println!();

    //
    // 1) FILE SIZE
    //
    let file_size = fs::metadata(db_path).map(|m| m.len()).unwrap_or(0);
    let file_mb = (file_size as f64) / (1024.0 * 1024.0);

    println!(
        "{}• File:{} {}{}{}",
        CYAN,
        RESET,
        YELLOW,
        db_path.display(),
        RESET
    );
    println!("{}• Size:{} {:.2} MB", CYAN, RESET, file_mb);

    //
    // 2) TOTAL SESSIONS
    //
    let stats = archive_stats(pool)?;
    println!(
        "{}• Archived sessions:{} {}{}{} ({} closed automatically)",
        CYAN, RESET, GREEN, stats.sessions, RESET, stats.auto_closed
    );

    //
    // 3) DATE RANGE
    //
    let fmt_first = stats
        .first_day
        .clone()
        .unwrap_or_else(|| format!("{GREY}--{RESET}"));
    let fmt_last = stats
        .last_day
        .clone()
        .unwrap_or_else(|| format!("{GREY}--{RESET}"));

    println!("{}• Date range:{}", CYAN, RESET);
    println!("    from: {}", fmt_first);
    println!("    to:   {}", fmt_last);

    //
    // 4) TOTALS AND AVERAGE WORK/DAY
    //
    println!(
        "{}• Worked:{} {}   {}breaks:{} {}   {}idle:{} {}",
        CYAN,
        RESET,
        secs2readable(stats.work_secs, false),
        GREY,
        RESET,
        secs2readable(stats.break_secs, true),
        GREY,
        RESET,
        secs2readable(stats.idle_secs, true)
    );

    if let (Some(f), Some(l)) = (stats.first_day.as_deref(), stats.last_day.as_deref())
        && let (Some(d1), Some(d2)) = (parse_day(f), parse_day(l))
    {
        let days = (d2 - d1).num_days() + 1;
        let avg = stats.work_secs / days.max(1);
        println!(
            "{}• Average work/day:{} {}",
            CYAN,
            RESET,
            secs2readable(avg, true)
        );
    }

    println!();
    Ok(())
}

fn parse_day(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}
