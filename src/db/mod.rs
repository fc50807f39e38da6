pub mod log;
pub mod migrate;
pub mod pool;
pub mod queries;
pub mod stats;

use crate::errors::AppResult;
use rusqlite::Connection;

/// Initialize the database.
/// Delegates all schema creation / upgrades to the migration engine.
pub fn init_db(conn: &Connection) -> AppResult<Vec<&'static str>> {
    migrate::run_pending_migrations(conn)
}
