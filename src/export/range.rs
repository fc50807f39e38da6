use crate::errors::{AppError, AppResult};
use chrono::{Datelike, NaiveDate};

fn invalid(r: &str) -> AppError {
    AppError::InvalidDate(format!(
        "'{r}' (expected YYYY, YYYY-MM, YYYY-MM-DD or FROM:TO in the same format)"
    ))
}

fn last_day_of_month(y: i32, m: u32) -> Option<NaiveDate> {
    let (ny, nm) = if m == 12 { (y + 1, 1) } else { (y, m + 1) };
    NaiveDate::from_ymd_opt(ny, nm, 1)?.pred_opt()
}

/// First and last day covered by a single YYYY / YYYY-MM / YYYY-MM-DD token.
fn bounds(token: &str) -> Option<(NaiveDate, NaiveDate)> {
    match token.len() {
        4 => {
            let y: i32 = token.parse().ok()?;
            Some((
                NaiveDate::from_ymd_opt(y, 1, 1)?,
                NaiveDate::from_ymd_opt(y, 12, 31)?,
            ))
        }
        7 => {
            let (y, m) = token.split_once('-')?;
            let (y, m): (i32, u32) = (y.parse().ok()?, m.parse().ok()?);
            Some((NaiveDate::from_ymd_opt(y, m, 1)?, last_day_of_month(y, m)?))
        }
        10 => {
            let d = NaiveDate::parse_from_str(token, "%Y-%m-%d").ok()?;
            Some((d, d))
        }
        _ => None,
    }
}

/// Parse a `--range` / `--period` expression into inclusive day bounds.
///
/// Accepts YYYY, YYYY-MM, YYYY-MM-DD, and FROM:TO where both sides use the
/// same one of those formats.
pub fn parse_range(r: &str) -> AppResult<(NaiveDate, NaiveDate)> {
    let r = r.trim();
    let (from, to) = match r.split_once(':') {
        Some((a, b)) => {
            let (a, b) = (a.trim(), b.trim());
            if a.len() != b.len() {
                return Err(invalid(r));
            }
            let (start, _) = bounds(a).ok_or_else(|| invalid(r))?;
            let (_, end) = bounds(b).ok_or_else(|| invalid(r))?;
            (start, end)
        }
        None => bounds(r).ok_or_else(|| invalid(r))?,
    };

    if from > to {
        return Err(AppError::InvalidDate(format!(
            "'{r}': start {from} is after end {to}"
        )));
    }
    Ok((from, to))
}

/// Bounds for today in local time.
pub fn today_bounds() -> (NaiveDate, NaiveDate) {
    let d = chrono::Local::now().date_naive();
    (d, d)
}

/// Bounds for the current local month.
pub fn current_month_bounds() -> (NaiveDate, NaiveDate) {
    let d = chrono::Local::now().date_naive();
    let first = d.with_day(1).unwrap_or(d);
    let last = last_day_of_month(d.year(), d.month()).unwrap_or(d);
    (first, last)
}
