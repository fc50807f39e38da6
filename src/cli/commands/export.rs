use crate::cli::parser::Commands;
use crate::config::Config;
use crate::db::migrate::run_pending_migrations;
use crate::db::pool::DbPool;
use crate::errors::AppResult;
use crate::export::ExportLogic;

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::Export {
        format,
        file,
        range,
        force,
    } = cmd
    {
        let pool = DbPool::new(cfg.database_path())?;
        run_pending_migrations(&pool.conn)?;
        ExportLogic::export(&pool, *format, file, range.as_deref(), *force)?;
    }
    Ok(())
}
