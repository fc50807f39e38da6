use crate::cli::parser::Cli;
use crate::config::Config;
use crate::db::init_db;
use crate::db::log;
use crate::db::pool::DbPool;
use crate::errors::AppResult;
use crate::models::{Heartbeat, HeartbeatRead};
use crate::store::heartbeat::HeartbeatFile;
use crate::ui::messages::warning;
use crate::utils::time;

/// Handle the `init` command
///
/// This initializes:
///  - the config directory and file (if missing)
///  - the SQLite database and all pending migrations
///  - the data directory with a clocked-out heartbeat
pub fn handle(cli: &Cli) -> AppResult<()> {
    let cfg = Config::init_all(cli.data_dir.as_deref())?;
    let db_path = cfg.database_path();

    println!("⚙️  Initializing rWorkClock…");
    println!("📄 Config file : {}", Config::config_file().display());
    println!("🗄️  Database   : {}", db_path.display());
    println!("📁 Data dir    : {}", cfg.data_path().display());

    let pool = DbPool::new(&db_path)?;
    let applied = init_db(&pool.conn)?;
    println!(
        "✅ Database initialized ({} migration(s) applied)",
        applied.len()
    );

    // A clocked-out heartbeat lets recovery tell a first clock-in that never
    // reached the heartbeat from a fresh install.
    let heartbeat = HeartbeatFile::new(cfg.heartbeat_path());
    if heartbeat.read() == HeartbeatRead::Absent {
        heartbeat.write(&Heartbeat::clocked_out(time::now()))?;
    }

    if let Err(e) = log::ttlog(
        &pool.conn,
        "init",
        "Database initialized",
        &format!("Database initialized at {}", db_path.display()),
    ) {
        warning(format!("Failed to write internal log: {}", e));
    }

    println!("🎉 rWorkClock initialization completed!");
    Ok(())
}
