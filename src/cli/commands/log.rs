use crate::cli::parser::Commands;
use crate::config::Config;
use crate::core::log::LogLogic;
use crate::db::migrate::run_pending_migrations;
use crate::db::pool::DbPool;
use crate::errors::AppResult;
use crate::store::activity_log::ActivityLog;

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::Log {
        print,
        tail,
        internal,
    } = cmd
    {
        if *print {
            let log = ActivityLog::new(cfg.json_log_path(), cfg.csv_log_path());
            let entries = log.tail(tail.unwrap_or(usize::MAX))?;
            LogLogic::print_activity(&entries);
        }

        if *internal {
            let pool = DbPool::new(cfg.database_path())?;
            run_pending_migrations(&pool.conn)?;
            LogLogic::print_internal(&pool)?;
        }
    }

    Ok(())
}
