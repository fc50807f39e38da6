use crate::errors::{AppError, AppResult};
use rusqlite::{Connection, OptionalExtension, Result};
use tracing::info;

/// Ensure that the `log` table exists. Applied migrations are recorded there.
fn ensure_log_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS log (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            date      TEXT NOT NULL,
            operation TEXT NOT NULL,
            target    TEXT DEFAULT '',
            message   TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

struct Migration {
    version: &'static str,
    description: &'static str,
    sql: &'static str,
}

/// Ordered schema history. Never edit an entry once released; append a new one.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "20250301_0001_create_sessions",
        description: "Created sessions archive",
        sql: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id           TEXT PRIMARY KEY,
                clock_in     TEXT NOT NULL,
                clock_out    TEXT NOT NULL,
                work_secs    INTEGER NOT NULL DEFAULT 0,
                break_secs   INTEGER NOT NULL DEFAULT 0,
                idle_secs    INTEGER NOT NULL DEFAULT 0,
                close_reason TEXT NOT NULL
                    CHECK(close_reason IN ('user','idle_timeout','system_shutdown','recovery')),
                created_at   TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_clock_in ON sessions(clock_in);
        "#,
    },
    Migration {
        version: "20250315_0002_add_session_day",
        description: "Added local day column to sessions",
        sql: r#"
            ALTER TABLE sessions ADD COLUMN day TEXT NOT NULL DEFAULT '';
            UPDATE sessions SET day = date(clock_in, 'localtime') WHERE day = '';
            CREATE INDEX IF NOT EXISTS idx_sessions_day ON sessions(day);
        "#,
    },
];

fn is_applied(conn: &Connection, version: &str) -> Result<bool> {
    let mut chk = conn.prepare(
        "SELECT 1 FROM log
         WHERE operation = 'migration_applied' AND target = ?1
         LIMIT 1",
    )?;
    Ok(chk.query_row([version], |_| Ok(())).optional()?.is_some())
}

fn apply(conn: &Connection, m: &Migration) -> AppResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(m.sql)
        .map_err(|e| AppError::Migration(format!("{}: {}", m.version, e)))?;
    tx.execute(
        "INSERT INTO log (date, operation, target, message)
         VALUES (datetime('now'), 'migration_applied', ?1, ?2)",
        [m.version, m.description],
    )?;
    tx.commit()?;
    Ok(())
}

/// Versions not yet applied to this database.
pub fn pending_migrations(conn: &Connection) -> AppResult<Vec<&'static str>> {
    ensure_log_table(conn)?;
    let mut out = Vec::new();
    for m in MIGRATIONS {
        if !is_applied(conn, m.version)? {
            out.push(m.version);
        }
    }
    Ok(out)
}

/// Public entry point: run all pending migrations, returning the versions applied.
///
/// Invoked by db::init_db() and by every store open.
pub fn run_pending_migrations(conn: &Connection) -> AppResult<Vec<&'static str>> {
    ensure_log_table(conn)?;

    let mut applied = Vec::new();
    for m in MIGRATIONS {
        if is_applied(conn, m.version)? {
            continue;
        }
        apply(conn, m)?;
        info!(version = m.version, "migration applied");
        applied.push(m.version);
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool::DbPool;

    #[test]
    fn migrations_are_idempotent() {
        let pool = DbPool::in_memory().unwrap();
        let first = run_pending_migrations(&pool.conn).unwrap();
        assert_eq!(first.len(), MIGRATIONS.len());
        assert!(run_pending_migrations(&pool.conn).unwrap().is_empty());
        assert!(pending_migrations(&pool.conn).unwrap().is_empty());
    }
}
