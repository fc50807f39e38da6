//! Formatting utilities used for CLI and export outputs.

pub fn bold(s: &str) -> String {
    format!("\x1b[1m{}\x1b[0m", s)
}

/// Seconds → "02h 25m" (or "02:25" when `short`).
pub fn secs2readable(secs: i64, short: bool) -> String {
    let mins = secs.max(0) / 60;
    let hours = mins / 60;
    let minutes = mins % 60;

    if short {
        format!("{:02}:{:02}", hours, minutes)
    } else {
        format!("{:02}h {:02}m", hours, minutes)
    }
}
