//! Versioned record storage, parameterized by entity kind.

use rusqlite::{params, Connection, OptionalExtension};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::models::{Kind, Record, RecordPatch, TodoStatus};
use crate::util::unix_millis_now;

/// `SQLite` store for synchronized records.
///
/// One instance serves both kinds; the kind tag selects the backing table.
/// Mutations preserve the version discipline: every successful write leaves
/// `version = previous + 1`.
pub struct RecordStore<'a> {
    conn: &'a Connection,
}

impl<'a> RecordStore<'a> {
    /// Create a store over the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a record from a database row
    fn parse_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<Record> {
        let status: Option<String> = row.get(3)?;
        let status = status
            .as_deref()
            .map(TodoStatus::from_str)
            .transpose()
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    3,
                    rusqlite::types::Type::Text,
                    Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())),
                )
            })?;

        Ok(Record {
            id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            status,
            version: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
            deleted_at: row.get(7)?,
        })
    }

    const COLUMNS: &'static str =
        "id, title, content, status, version, created_at, updated_at, deleted_at";

    /// Get the current record, tombstone or not.
    ///
    /// The sync processor reads through this so tombstones still participate
    /// in conflict detection.
    pub fn get(&self, kind: Kind, id: &str) -> Result<Option<Record>> {
        let sql = format!("SELECT {} FROM {} WHERE id = ?", Self::COLUMNS, kind.table());
        let record = self
            .conn
            .query_row(&sql, params![id], Self::parse_record)
            .optional()?;
        Ok(record)
    }

    /// Get the current record, excluding tombstones.
    pub fn get_live(&self, kind: Kind, id: &str) -> Result<Option<Record>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ? AND deleted_at IS NULL",
            Self::COLUMNS,
            kind.table()
        );
        let record = self
            .conn
            .query_row(&sql, params![id], Self::parse_record)
            .optional()?;
        Ok(record)
    }

    /// Insert a fresh record; fails with [`Error::Duplicate`] when the id is
    /// already taken within the kind.
    pub fn insert(&self, kind: Kind, record: &Record) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            kind.table(),
            Self::COLUMNS
        );
        let result = self.conn.execute(
            &sql,
            params![
                record.id,
                record.title,
                record.content,
                record.status.map(TodoStatus::as_str),
                record.version,
                record.created_at,
                record.updated_at,
                record.deleted_at,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::Duplicate(format!("{} record {}", kind, record.id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Compare-and-set update: applies the patch and bumps the version only
    /// when the live record's version equals `expected_version`.
    ///
    /// Tombstones are ineligible. Returns `None` when no eligible row
    /// matched (absent, tombstoned, or version mismatch).
    pub fn update_if_version(
        &self,
        kind: Kind,
        id: &str,
        expected_version: i64,
        patch: &RecordPatch,
    ) -> Result<Option<Record>> {
        let sql = format!(
            "UPDATE {} SET
                title = COALESCE(?, title),
                content = COALESCE(?, content),
                status = COALESCE(?, status),
                version = version + 1,
                updated_at = ?
             WHERE id = ? AND version = ? AND deleted_at IS NULL",
            kind.table()
        );
        let rows = self.conn.execute(
            &sql,
            params![
                patch.title,
                patch.content,
                patch.status.map(TodoStatus::as_str),
                unix_millis_now(),
                id,
                expected_version,
            ],
        )?;

        if rows == 0 {
            return Ok(None);
        }
        self.get(kind, id)
    }

    /// Compare-and-set soft delete: stamps `deleted_at` and bumps the
    /// version when the live record's version equals `expected_version`.
    ///
    /// Returns `None` when no eligible row matched.
    pub fn soft_delete_if_version(
        &self,
        kind: Kind,
        id: &str,
        expected_version: i64,
    ) -> Result<Option<Record>> {
        let now = unix_millis_now();
        let sql = format!(
            "UPDATE {} SET
                deleted_at = ?,
                version = version + 1,
                updated_at = ?
             WHERE id = ? AND version = ? AND deleted_at IS NULL",
            kind.table()
        );
        let rows = self
            .conn
            .execute(&sql, params![now, now, id, expected_version])?;

        if rows == 0 {
            return Ok(None);
        }
        self.get(kind, id)
    }

    /// Unconditional write used only by the conflict resolver.
    ///
    /// An existing record (tombstone included) gets the patch applied and its
    /// version bumped, superseding both sides of the conflict. An absent
    /// record is materialized at version 1, which requires the patch to carry
    /// a title.
    pub fn force_update(&self, kind: Kind, id: &str, patch: &RecordPatch) -> Result<Record> {
        if self.get(kind, id)?.is_none() {
            let title = patch
                .title
                .clone()
                .filter(|title| !title.trim().is_empty())
                .ok_or_else(|| {
                    Error::InvalidInput(format!(
                        "Cannot materialize {kind} record {id} without a title"
                    ))
                })?;
            let record = Record::new(id, title, patch.content.clone(), patch.status);
            self.insert(kind, &record)?;
            return Ok(record);
        }

        let sql = format!(
            "UPDATE {} SET
                title = COALESCE(?, title),
                content = COALESCE(?, content),
                status = COALESCE(?, status),
                version = version + 1,
                updated_at = ?
             WHERE id = ?",
            kind.table()
        );
        self.conn.execute(
            &sql,
            params![
                patch.title,
                patch.content,
                patch.status.map(TodoStatus::as_str),
                unix_millis_now(),
                id,
            ],
        )?;

        self.get(kind, id)?
            .ok_or_else(|| Error::NotFound(format!("{kind} record {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn todo(id: &str, title: &str) -> Record {
        Record::new(id, title, None, Some(TodoStatus::Pending))
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup();
        let store = RecordStore::new(db.connection());

        store.insert(Kind::Todos, &todo("t1", "buy milk")).unwrap();

        let fetched = store.get(Kind::Todos, "t1").unwrap().unwrap();
        assert_eq!(fetched.title, "buy milk");
        assert_eq!(fetched.version, 1);
        assert_eq!(fetched.status, Some(TodoStatus::Pending));
    }

    #[test]
    fn test_insert_duplicate_id_fails() {
        let db = setup();
        let store = RecordStore::new(db.connection());

        store.insert(Kind::Todos, &todo("t1", "buy milk")).unwrap();
        let err = store.insert(Kind::Todos, &todo("t1", "again")).unwrap_err();
        assert!(matches!(err, Error::Duplicate(_)));
    }

    #[test]
    fn test_same_id_allowed_across_kinds() {
        let db = setup();
        let store = RecordStore::new(db.connection());

        store.insert(Kind::Todos, &todo("x", "todo")).unwrap();
        store
            .insert(Kind::Notes, &Record::new("x", "note", None, None))
            .unwrap();

        assert!(store.get(Kind::Todos, "x").unwrap().is_some());
        assert!(store.get(Kind::Notes, "x").unwrap().is_some());
    }

    #[test]
    fn test_update_if_version_matches() {
        let db = setup();
        let store = RecordStore::new(db.connection());
        store.insert(Kind::Todos, &todo("t1", "buy milk")).unwrap();

        let patch = RecordPatch {
            title: Some("buy bread".to_string()),
            ..RecordPatch::default()
        };
        let updated = store
            .update_if_version(Kind::Todos, "t1", 1, &patch)
            .unwrap()
            .unwrap();

        assert_eq!(updated.title, "buy bread");
        assert_eq!(updated.version, 2);
        // Unpatched fields are preserved
        assert_eq!(updated.status, Some(TodoStatus::Pending));
    }

    #[test]
    fn test_update_if_version_mismatch() {
        let db = setup();
        let store = RecordStore::new(db.connection());
        store.insert(Kind::Todos, &todo("t1", "buy milk")).unwrap();

        let patch = RecordPatch {
            title: Some("buy bread".to_string()),
            ..RecordPatch::default()
        };
        let result = store.update_if_version(Kind::Todos, "t1", 5, &patch).unwrap();
        assert!(result.is_none());

        // Record unchanged
        let current = store.get(Kind::Todos, "t1").unwrap().unwrap();
        assert_eq!(current.title, "buy milk");
        assert_eq!(current.version, 1);
    }

    #[test]
    fn test_update_if_version_skips_tombstone() {
        let db = setup();
        let store = RecordStore::new(db.connection());
        store.insert(Kind::Todos, &todo("t1", "buy milk")).unwrap();
        store.soft_delete_if_version(Kind::Todos, "t1", 1).unwrap();

        let patch = RecordPatch {
            title: Some("resurrect".to_string()),
            ..RecordPatch::default()
        };
        // Version 2 is the tombstone's current version, still ineligible
        let result = store.update_if_version(Kind::Todos, "t1", 2, &patch).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_soft_delete_creates_tombstone() {
        let db = setup();
        let store = RecordStore::new(db.connection());
        store.insert(Kind::Notes, &Record::new("n1", "memo", None, None)).unwrap();

        let tombstone = store
            .soft_delete_if_version(Kind::Notes, "n1", 1)
            .unwrap()
            .unwrap();
        assert!(tombstone.is_tombstone());
        assert_eq!(tombstone.version, 2);

        // Visible to get, invisible to get_live
        assert!(store.get(Kind::Notes, "n1").unwrap().is_some());
        assert!(store.get_live(Kind::Notes, "n1").unwrap().is_none());
    }

    #[test]
    fn test_soft_delete_version_mismatch() {
        let db = setup();
        let store = RecordStore::new(db.connection());
        store.insert(Kind::Notes, &Record::new("n1", "memo", None, None)).unwrap();

        let result = store.soft_delete_if_version(Kind::Notes, "n1", 9).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_force_update_bumps_version_unconditionally() {
        let db = setup();
        let store = RecordStore::new(db.connection());
        store.insert(Kind::Todos, &todo("t1", "buy milk")).unwrap();

        let patch = RecordPatch {
            title: Some("buy bread".to_string()),
            ..RecordPatch::default()
        };
        let resolved = store.force_update(Kind::Todos, "t1", &patch).unwrap();
        assert_eq!(resolved.title, "buy bread");
        assert_eq!(resolved.version, 2);
    }

    #[test]
    fn test_force_update_materializes_absent_record() {
        let db = setup();
        let store = RecordStore::new(db.connection());

        let patch = RecordPatch {
            title: Some("salvaged".to_string()),
            content: Some("from a conflict".to_string()),
            ..RecordPatch::default()
        };
        let record = store.force_update(Kind::Notes, "n9", &patch).unwrap();
        assert_eq!(record.version, 1);
        assert_eq!(record.title, "salvaged");
    }

    #[test]
    fn test_force_update_absent_requires_title() {
        let db = setup();
        let store = RecordStore::new(db.connection());

        let patch = RecordPatch {
            content: Some("no title".to_string()),
            ..RecordPatch::default()
        };
        let err = store.force_update(Kind::Notes, "n9", &patch).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_force_update_touches_tombstone() {
        let db = setup();
        let store = RecordStore::new(db.connection());
        store.insert(Kind::Todos, &todo("t1", "buy milk")).unwrap();
        store.soft_delete_if_version(Kind::Todos, "t1", 1).unwrap();

        let patch = RecordPatch {
            title: Some("decided".to_string()),
            ..RecordPatch::default()
        };
        let resolved = store.force_update(Kind::Todos, "t1", &patch).unwrap();
        assert_eq!(resolved.version, 3);
        // Resolution does not resurrect; the tombstone stamp stays
        assert!(resolved.is_tombstone());
    }
}
