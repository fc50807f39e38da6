//! Time utilities: second-granularity clock reads, RFC 3339 round-trips,
//! duration formatting.

use crate::errors::{AppError, AppResult};
use crate::models::Timestamp;
use chrono::{DateTime, Local, SubsecRound, Utc};

/// Current wall-clock time truncated to whole seconds.
pub fn now() -> Timestamp {
    Utc::now().trunc_subsecs(0)
}

pub fn parse_rfc3339(s: &str) -> AppResult<Timestamp> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| AppError::InvalidDate(s.to_string()))
}

/// Local "YYYY-MM-DD HH:MM:SS", as shown in the activity log.
pub fn local_string(ts: &Timestamp) -> String {
    ts.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

pub fn local_hms(ts: &Timestamp) -> String {
    ts.with_timezone(&Local).format("%H:%M:%S").to_string()
}

/// Seconds as `H:MM:SS`.
pub fn format_secs(secs: i64) -> String {
    let sign = if secs < 0 { "-" } else { "" };
    let s = secs.abs();
    format!("{}{}:{:02}:{:02}", sign, s / 3600, (s % 3600) / 60, s % 60)
}
