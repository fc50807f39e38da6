use crate::db::log::{InternalLogRow, load_internal_log};
use crate::db::pool::DbPool;
use crate::errors::AppResult;
use crate::models::{EventKind, LogEntry};
use crate::utils::time::local_string;
use ansi_term::Colour;
use regex::Regex;
use std::sync::OnceLock;

fn strip_ansi(s: &str) -> String {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    match RE.get_or_init(|| Regex::new(r"\x1B\[[0-9;]*[mK]").ok()) {
        Some(re) => re.replace_all(s, "").into_owned(),
        None => s.to_string(),
    }
}

/// Colour of an activity log event.
fn color_for_kind(kind: EventKind) -> Colour {
    match kind {
        EventKind::ClockIn => Colour::Green,
        EventKind::ClockOut => Colour::Red,
        EventKind::BreakStart | EventKind::BreakEnd => Colour::Yellow,
        EventKind::IdleStart | EventKind::IdleEnd => Colour::RGB(255, 153, 51),
        EventKind::SystemSleep | EventKind::SystemResume => Colour::Blue,
        EventKind::Lock | EventKind::Unlock => Colour::Cyan,
        EventKind::RecoveredAutoClockOut | EventKind::RecoveredResume => Colour::Purple,
    }
}

/// Colour of an internal log operation.
fn color_for_operation(op: &str) -> Colour {
    match op {
        "init" => Colour::RGB(255, 153, 51),
        "migration_applied" => Colour::Purple,
        "archive" => Colour::Green,
        "recover" => Colour::Yellow,
        "export" => Colour::Blue,
        _ => Colour::White,
    }
}

/// `[2025-03-10 09:00:00] CLOCK_IN: Started work session`
pub fn format_entry(entry: &LogEntry, color: bool) -> String {
    let ts = local_string(&entry.timestamp);
    let kind = entry.kind.as_str();
    if color {
        format!(
            "[{}] {}: {}",
            ts,
            color_for_kind(entry.kind).bold().paint(kind),
            entry.details
        )
    } else {
        format!("[{}] {}: {}", ts, kind, entry.details)
    }
}

pub struct LogLogic;

impl LogLogic {
    pub fn print_activity(entries: &[LogEntry]) {
        if entries.is_empty() {
            println!("📜 Activity log is empty.");
            return;
        }

        println!("📜 Activity log:\n");
        for entry in entries {
            println!("{}", format_entry(entry, true));
        }
    }

    pub fn print_internal(pool: &DbPool) -> AppResult<()> {
        let entries = load_internal_log(&pool.conn)?;
        if entries.is_empty() {
            println!("📜 Internal log is empty.");
            return Ok(());
        }

        let rows: Vec<(InternalLogRow, String)> = entries
            .into_iter()
            .map(|r| {
                let date = chrono::DateTime::parse_from_rfc3339(&r.date)
                    .map(|dt| dt.format("%FT%T%:z").to_string())
                    .unwrap_or_else(|_| r.date.clone());
                (r, date)
            })
            .collect();

        let id_w = rows
            .iter()
            .map(|(r, _)| r.id.to_string().len())
            .max()
            .unwrap_or(1);
        let date_w = rows.iter().map(|(_, d)| d.len()).max().unwrap_or(10);
        let op_w = rows
            .iter()
            .map(|(r, _)| op_target(r).len())
            .max()
            .unwrap_or(10)
            .min(60);

        println!("📜 Internal log:\n");

        for (row, date) in &rows {
            let color = color_for_operation(&row.operation);
            let mut visible = op_target(row);
            if visible.chars().count() > 60 {
                visible = visible.chars().take(57).collect::<String>() + "...";
            }

            // Only the operation word is coloured.
            let colored = match visible.split_once(' ') {
                Some((op, rest)) => format!("{} {}", color.paint(op), rest),
                None => color.paint(visible.as_str()).to_string(),
            };
            let padding = " ".repeat(op_w.saturating_sub(strip_ansi(&colored).chars().count()));

            println!(
                "{:>id_w$}: {:<date_w$} | {}{} => {}",
                row.id,
                date,
                colored,
                padding,
                row.message,
                id_w = id_w,
                date_w = date_w
            );
        }

        Ok(())
    }
}

fn op_target(r: &InternalLogRow) -> String {
    if r.target.is_empty() {
        r.operation.clone()
    } else {
        format!("{} ({})", r.operation, r.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionState;
    use chrono::Utc;

    #[test]
    fn plain_and_coloured_lines_match_once_stripped() {
        let e = LogEntry::new(
            Utc::now(),
            EventKind::IdleStart,
            Some("s"),
            SessionState::IdleSuspended,
            "No activity",
        );
        let plain = format_entry(&e, false);
        assert!(plain.ends_with("] IDLE_START: No activity"));
        assert_eq!(strip_ansi(&format_entry(&e, true)), plain);
    }
}
