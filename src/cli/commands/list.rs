use crate::cli::parser::Commands;
use crate::config::Config;
use crate::db::migrate::run_pending_migrations;
use crate::db::pool::DbPool;
use crate::db::queries::load_sessions;
use crate::errors::AppResult;
use crate::export::range::{current_month_bounds, parse_range, today_bounds};
use crate::models::Session;
use crate::utils::colors::{RESET, color_for_close_reason};
use crate::utils::formatting::secs2readable;
use crate::utils::table::Table;
use crate::utils::time::format_secs;
use chrono::{Local, NaiveDate};

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::List { period, today } = cmd {
        let pool = DbPool::new(cfg.database_path())?;
        run_pending_migrations(&pool.conn)?;

        let bounds = resolve_period(period.as_deref(), *today)?;
        let sessions = load_sessions(&pool.conn, bounds)?;

        if sessions.is_empty() {
            println!("No archived sessions for the selected period.");
            return Ok(());
        }

        print_sessions(&sessions);
    }
    Ok(())
}

/// `--today` wins; `all` lists everything; default is the current month.
fn resolve_period(period: Option<&str>, today: bool) -> AppResult<Option<(NaiveDate, NaiveDate)>> {
    if today {
        return Ok(Some(today_bounds()));
    }
    match period {
        Some(p) if p.eq_ignore_ascii_case("all") => Ok(None),
        Some(p) => Ok(Some(parse_range(p)?)),
        None => Ok(Some(current_month_bounds())),
    }
}

fn print_sessions(sessions: &[Session]) {
    let mut table = Table::new(&["Date", "In", "Out", "Work", "Breaks", "Idle", "Closed by"]);

    let mut work = 0;
    for s in sessions {
        let clock_in = s.clock_in.with_timezone(&Local);
        let clock_out = s
            .clock_out
            .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "--:--".into());
        let reason = s.close_reason.map(|r| r.as_str()).unwrap_or("");

        table.add_row(vec![
            clock_in.format("%Y-%m-%d").to_string(),
            clock_in.format("%H:%M:%S").to_string(),
            clock_out,
            format_secs(s.total_work_secs),
            format_secs(s.total_break_secs),
            format_secs(s.total_idle_secs),
            // Last column: colour codes cannot break the alignment.
            format!("{}{}{}", color_for_close_reason(reason), reason, RESET),
        ]);
        work += s.total_work_secs;
    }

    println!("{}", table.render());
    println!(
        "{} session(s), worked {}",
        sessions.len(),
        secs2readable(work, false)
    );
}
