//! Database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 1;

/// Run all pending migrations
pub fn run(conn: &mut Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}

/// Migration to version 1: initial sync schema
fn migrate_v1(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute_batch(
        "
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        -- Record tables, one per kind; identical columns, the status
        -- column is only populated for todos
        CREATE TABLE IF NOT EXISTS records_todos (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            content TEXT,
            status TEXT,
            version INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            deleted_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_records_todos_deleted ON records_todos(deleted_at);
        CREATE INDEX IF NOT EXISTS idx_records_todos_updated ON records_todos(updated_at DESC);

        CREATE TABLE IF NOT EXISTS records_notes (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            content TEXT,
            status TEXT,
            version INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            deleted_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_records_notes_deleted ON records_notes(deleted_at);
        CREATE INDEX IF NOT EXISTS idx_records_notes_updated ON records_notes(updated_at DESC);

        -- Conflict evidence, keyed by the offending operation id
        CREATE TABLE IF NOT EXISTS conflicts (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            record_id TEXT NOT NULL,
            server_data TEXT,
            client_data TEXT NOT NULL,
            server_version INTEGER NOT NULL,
            client_version INTEGER NOT NULL,
            status TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            resolved_at INTEGER,
            resolved_data TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_conflicts_status ON conflicts(status);
        CREATE INDEX IF NOT EXISTS idx_conflicts_record ON conflicts(kind, record_id);
        CREATE INDEX IF NOT EXISTS idx_conflicts_created ON conflicts(created_at DESC);

        -- Idempotency ledger: one row per terminally applied operation
        CREATE TABLE IF NOT EXISTS processed_operations (
            operation_id TEXT PRIMARY KEY,
            action TEXT NOT NULL,
            kind TEXT NOT NULL,
            processed_at INTEGER NOT NULL
        );

        INSERT INTO schema_version (version) VALUES (1);
        ",
    )?;

    tx.commit()?;

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn test_migrations() {
        let mut conn = setup();
        run(&mut conn).unwrap();

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migrations_idempotent() {
        let mut conn = setup();
        run(&mut conn).unwrap();
        run(&mut conn).unwrap(); // Should not fail

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migration_v1_creates_sync_tables() {
        let mut conn = setup();
        run(&mut conn).unwrap();

        for table in [
            "records_todos",
            "records_notes",
            "conflicts",
            "processed_operations",
        ] {
            let exists: bool = conn
                .query_row(
                    "SELECT EXISTS(
                        SELECT 1 FROM sqlite_master
                        WHERE type = 'table' AND name = ?
                    )",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert!(exists, "missing table {table}");
        }
    }
}
