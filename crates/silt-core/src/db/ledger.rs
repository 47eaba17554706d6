//! Idempotency ledger over processed operation ids.

use rusqlite::{params, Connection};

use crate::error::{Error, Result};
use crate::models::{Action, Kind};
use crate::util::unix_millis_now;

/// Append-only log of terminally applied operations.
///
/// Presence of an `operation_id` means the operation completed; replays are
/// rejected without re-executing side effects. Conflict detection is a
/// pending state, not a terminal one, so conflicted operations are never
/// written here.
pub struct ProcessedLedger<'a> {
    conn: &'a Connection,
}

impl<'a> ProcessedLedger<'a> {
    /// Create a ledger over the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Whether an entry exists for this operation id.
    pub fn seen(&self, operation_id: &str) -> Result<bool> {
        let seen: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM processed_operations WHERE operation_id = ?)",
            params![operation_id],
            |row| row.get(0),
        )?;
        Ok(seen)
    }

    /// Write the entry marking this operation as terminally applied.
    ///
    /// Must run in the same transaction as the side effect it records. A
    /// duplicate write fails the transaction.
    pub fn record(&self, operation_id: &str, action: Action, kind: Kind) -> Result<()> {
        let result = self.conn.execute(
            "INSERT INTO processed_operations (operation_id, action, kind, processed_at)
             VALUES (?, ?, ?, ?)",
            params![operation_id, action.as_str(), kind.as_str(), unix_millis_now()],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::Duplicate(format!("ledger entry {operation_id}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Number of ledger entries, used by tests and diagnostics.
    pub fn len(&self) -> Result<usize> {
        let count: usize =
            self.conn
                .query_row("SELECT COUNT(*) FROM processed_operations", [], |row| {
                    row.get(0)
                })?;
        Ok(count)
    }

    /// Whether the ledger is empty.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_unseen_then_seen() {
        let db = setup();
        let ledger = ProcessedLedger::new(db.connection());

        assert!(!ledger.seen("o1").unwrap());
        ledger.record("o1", Action::Create, Kind::Todos).unwrap();
        assert!(ledger.seen("o1").unwrap());
    }

    #[test]
    fn test_duplicate_record_fails() {
        let db = setup();
        let ledger = ProcessedLedger::new(db.connection());

        ledger.record("o1", Action::Create, Kind::Todos).unwrap();
        let err = ledger.record("o1", Action::Update, Kind::Todos).unwrap_err();
        assert!(matches!(err, Error::Duplicate(_)));
    }

    #[test]
    fn test_len_counts_entries() {
        let db = setup();
        let ledger = ProcessedLedger::new(db.connection());

        assert!(ledger.is_empty().unwrap());
        ledger.record("o1", Action::Create, Kind::Todos).unwrap();
        ledger.record("o2", Action::Delete, Kind::Notes).unwrap();
        assert_eq!(ledger.len().unwrap(), 2);
    }
}
