//! Database migrations.
//!
//! Migrations run in order and are tracked in the `migrations` table.

use crate::DatabaseResult;
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version.
pub const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> DatabaseResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM migrations",
        [],
        |row| row.get(0),
    )?;

    if current_version >= CURRENT_VERSION {
        debug!(current_version, "Schema up to date");
        return Ok(());
    }

    info!(current_version, target_version = CURRENT_VERSION, "Running migrations");

    if current_version < 1 {
        migrate_v1_spool_messages(conn)?;
    }
    if current_version < 2 {
        migrate_v2_flush_lease(conn)?;
    }

    info!("Migrations complete");
    Ok(())
}

fn record_migration(conn: &Connection, version: i32, name: &str) -> DatabaseResult<()> {
    conn.execute(
        "INSERT INTO migrations (version, name) VALUES (?1, ?2)",
        rusqlite::params![version, name],
    )?;
    debug!(version, name, "Migration applied");
    Ok(())
}

/// V1: message table.
///
/// Timestamps are unix milliseconds so age checks stay in SQL.
fn migrate_v1_spool_messages(conn: &Connection) -> DatabaseResult<()> {
    info!("Applying migration v1: spool messages");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS spool_messages (
            id TEXT PRIMARY KEY,
            sender TEXT NOT NULL,
            recipients TEXT NOT NULL,
            subject TEXT,
            body BLOB NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'in_flight', 'sent', 'failed')),
            attempts INTEGER NOT NULL DEFAULT 0,
            permanent INTEGER NOT NULL DEFAULT 0,
            last_error TEXT,
            enqueued_at INTEGER NOT NULL,
            last_attempt_at INTEGER,
            sent_at INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_spool_messages_status_enqueued
            ON spool_messages(status, enqueued_at);
        CREATE INDEX IF NOT EXISTS idx_spool_messages_in_flight
            ON spool_messages(last_attempt_at) WHERE status = 'in_flight';
        ",
    )?;

    record_migration(conn, 1, "spool_messages")?;
    Ok(())
}

/// V2: single-row advisory lease guarding flush passes.
fn migrate_v2_flush_lease(conn: &Connection) -> DatabaseResult<()> {
    info!("Applying migration v2: flush lease");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS spool_flush_lease (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            holder TEXT NOT NULL,
            acquired_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL
        );
        ",
    )?;

    record_migration(conn, 2, "spool_flush_lease")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_create_tables() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert!(tables.contains(&"spool_messages".to_string()));
        assert!(tables.contains(&"spool_flush_lease".to_string()));
        assert!(tables.contains(&"migrations".to_string()));
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let applied: i64 = conn
            .query_row("SELECT COUNT(*) FROM migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied, CURRENT_VERSION as i64);
    }

    #[test]
    fn test_status_check_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO spool_messages (id, sender, recipients, body, status, enqueued_at)
             VALUES ('m1', 'a@example.com', '[]', x'', 'bogus', 0)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_lease_table_holds_one_row() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO spool_flush_lease (id, holder, acquired_at, expires_at) VALUES (1, 'a', 0, 1)",
            [],
        )
        .unwrap();
        let second = conn.execute(
            "INSERT INTO spool_flush_lease (id, holder, acquired_at, expires_at) VALUES (2, 'b', 0, 1)",
            [],
        );
        assert!(second.is_err());
    }
}
