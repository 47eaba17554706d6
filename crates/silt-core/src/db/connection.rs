//! `SQLite` handle shared by the sync stores.

use crate::error::Result;
use rusqlite::Connection;
use std::path::Path;

use super::migrations;

/// Path value that selects an ephemeral in-memory database.
const MEMORY_PATH: &str = ":memory:";

/// Owned connection with the sync schema applied.
///
/// Records, conflicts, and the ledger all live behind this one connection;
/// the service layer's mutex serializes the writers that share it.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `path`, creating the file and schema as needed.
    ///
    /// `:memory:` selects an ephemeral database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut conn = Connection::open(path)?;

        // WAL keeps conflict listings readable while a batch commits; an
        // in-memory database has no journal file to configure.
        if path != Path::new(MEMORY_PATH) {
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                ",
            )?;
        }
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            ",
        )?;

        migrations::run(&mut conn)?;
        Ok(Self { conn })
    }

    /// Open an ephemeral in-memory database (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        Self::open(MEMORY_PATH)
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Get a mutable reference to the underlying connection
    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_applies_schema() {
        let db = Database::open_in_memory().unwrap();
        let count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM processed_operations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn open_leaves_connection_in_autocommit() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.connection().is_autocommit());
    }
}
