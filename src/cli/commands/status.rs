use crate::config::Config;
use crate::errors::AppResult;
use crate::models::{HeartbeatRead, Session, SessionState, Timestamp};
use crate::store::heartbeat::HeartbeatFile;
use crate::ui::messages::warning;
use crate::utils::colors::{GREY, RESET};
use crate::utils::formatting::bold;
use crate::utils::time::{self, format_secs, local_string};

/// State badge plus live durations of the open session, if any.
pub fn print_state(session: Option<&Session>, state: SessionState, now: Timestamp) {
    println!("{}", bold(state.badge()));

    let Some(s) = session else {
        return;
    };

    let totals = s.live_totals(now);
    println!("  Session   : {}{}{}", GREY, s.id, RESET);
    println!("  Clocked in: {}", local_string(&s.clock_in));
    println!(
        "  Worked    : {}   Breaks: {}   Idle: {}",
        format_secs(totals.work_secs),
        format_secs(totals.break_secs),
        format_secs(totals.idle_secs)
    );
    if let Some(idle_since) = s.idle_since {
        println!("  Idle since: {}", local_string(&idle_since));
    }
}

/// Handle `status`: read-only view of the last heartbeat.
pub fn handle(cfg: &Config) -> AppResult<()> {
    let now = time::now();

    match HeartbeatFile::new(cfg.heartbeat_path()).read() {
        HeartbeatRead::Absent => {
            print_state(None, SessionState::ClockedOut, now);
            println!("  {}(no heartbeat yet){}", GREY, RESET);
        }
        HeartbeatRead::Corrupt(reason) => {
            warning(format!(
                "Heartbeat unreadable ({}); `rworkclock recover` will rebuild it from the activity log.",
                reason
            ));
        }
        HeartbeatRead::Present(hb) => {
            print_state(hb.session.as_ref(), hb.state, now);
            let age = (now - hb.timestamp).num_seconds();
            println!(
                "  {}Last heartbeat: {} ({} ago){}",
                GREY,
                local_string(&hb.timestamp),
                format_secs(age.max(0)),
                RESET
            );
            if hb.state.is_open() && age >= cfg.idle_threshold_seconds as i64 {
                warning("No live tracker has refreshed this session recently; it will be closed on the next start.");
            }
        }
    }

    Ok(())
}
