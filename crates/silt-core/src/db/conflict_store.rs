//! Conflict persistence and lifecycle transitions.

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::models::{Conflict, ConflictFilter, ConflictStats, ConflictStatus, Kind, Record};
use crate::util::unix_millis_now;

/// Row image before JSON columns are decoded.
struct RawConflict {
    id: String,
    kind: String,
    record_id: String,
    server_data: Option<String>,
    client_data: String,
    server_version: i64,
    client_version: i64,
    status: String,
    created_at: i64,
    resolved_at: Option<i64>,
    resolved_data: Option<String>,
}

/// `SQLite` store for conflict records.
///
/// The primary key is the offending operation id, which enforces at most one
/// conflict per operation. Snapshots are stored as JSON text columns.
pub struct ConflictStore<'a> {
    conn: &'a Connection,
}

impl<'a> ConflictStore<'a> {
    /// Create a store over the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    const COLUMNS: &'static str = "id, kind, record_id, server_data, client_data, \
         server_version, client_version, status, created_at, resolved_at, resolved_data";

    fn parse_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawConflict> {
        Ok(RawConflict {
            id: row.get(0)?,
            kind: row.get(1)?,
            record_id: row.get(2)?,
            server_data: row.get(3)?,
            client_data: row.get(4)?,
            server_version: row.get(5)?,
            client_version: row.get(6)?,
            status: row.get(7)?,
            created_at: row.get(8)?,
            resolved_at: row.get(9)?,
            resolved_data: row.get(10)?,
        })
    }

    fn decode(raw: RawConflict) -> Result<Conflict> {
        let server_data: Option<Record> = raw
            .server_data
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        let resolved_data: Option<Record> = raw
            .resolved_data
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        Ok(Conflict {
            id: raw.id,
            kind: Kind::from_str(&raw.kind)?,
            record_id: raw.record_id,
            server_data,
            client_data: serde_json::from_str(&raw.client_data)?,
            server_version: raw.server_version,
            client_version: raw.client_version,
            status: ConflictStatus::from_str(&raw.status)?,
            created_at: raw.created_at,
            resolved_at: raw.resolved_at,
            resolved_data,
        })
    }

    /// Persist a freshly detected conflict.
    ///
    /// Fails with [`Error::Duplicate`] when a conflict for the operation id
    /// already exists.
    pub fn create(&self, conflict: &Conflict) -> Result<()> {
        let server_data = conflict
            .server_data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let client_data = serde_json::to_string(&conflict.client_data)?;

        let sql = format!(
            "INSERT INTO conflicts ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            Self::COLUMNS
        );
        let result = self.conn.execute(
            &sql,
            params![
                conflict.id,
                conflict.kind.as_str(),
                conflict.record_id,
                server_data,
                client_data,
                conflict.server_version,
                conflict.client_version,
                conflict.status.as_str(),
                conflict.created_at,
                conflict.resolved_at,
                None::<String>,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::Duplicate(format!("conflict {}", conflict.id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch one conflict by id.
    pub fn get(&self, id: &str) -> Result<Option<Conflict>> {
        let sql = format!("SELECT {} FROM conflicts WHERE id = ?", Self::COLUMNS);
        let raw = self
            .conn
            .query_row(&sql, params![id], Self::parse_raw)
            .optional()?;
        raw.map(Self::decode).transpose()
    }

    /// List conflicts matching the filter, newest first.
    pub fn list(&self, filter: &ConflictFilter) -> Result<Vec<Conflict>> {
        let mut sql = format!("SELECT {} FROM conflicts", Self::COLUMNS);
        let mut clauses: Vec<&str> = Vec::new();
        let mut bindings: Vec<Value> = Vec::new();

        if let Some(status) = filter.status {
            clauses.push("status = ?");
            bindings.push(Value::from(status.as_str().to_string()));
        }
        if let Some(kind) = filter.kind {
            clauses.push("kind = ?");
            bindings.push(Value::from(kind.as_str().to_string()));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT ?");
        bindings.push(Value::from(filter.limit as i64));

        let mut stmt = self.conn.prepare(&sql)?;
        let raws = stmt
            .query_map(params_from_iter(bindings), Self::parse_raw)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        raws.into_iter().map(Self::decode).collect()
    }

    /// Transition PENDING → RESOLVED, recording the applied snapshot.
    ///
    /// `resolved` is `None` for the record-level dismissal path (SERVER
    /// choice over an absent record).
    pub fn transition_to_resolved(
        &self,
        id: &str,
        resolved: Option<&Record>,
    ) -> Result<Conflict> {
        let resolved_json = resolved.map(serde_json::to_string).transpose()?;
        let rows = self.conn.execute(
            "UPDATE conflicts SET status = 'RESOLVED', resolved_at = ?, resolved_data = ?
             WHERE id = ? AND status = 'PENDING'",
            params![unix_millis_now(), resolved_json, id],
        )?;

        if rows == 0 {
            return Err(self.transition_failure(id)?);
        }
        self.get(id)?
            .ok_or_else(|| Error::NotFound(format!("conflict {id}")))
    }

    /// Transition PENDING → DISMISSED without touching the record.
    pub fn transition_to_dismissed(&self, id: &str) -> Result<Conflict> {
        let rows = self.conn.execute(
            "UPDATE conflicts SET status = 'DISMISSED', resolved_at = ?
             WHERE id = ? AND status = 'PENDING'",
            params![unix_millis_now(), id],
        )?;

        if rows == 0 {
            return Err(self.transition_failure(id)?);
        }
        self.get(id)?
            .ok_or_else(|| Error::NotFound(format!("conflict {id}")))
    }

    /// Distinguish a missing conflict from one already terminal.
    fn transition_failure(&self, id: &str) -> Result<Error> {
        Ok(match self.get(id)? {
            None => Error::NotFound(format!("conflict {id}")),
            Some(conflict) => Error::IllegalTransition(format!(
                "conflict {id} is {}, only PENDING can transition",
                conflict.status
            )),
        })
    }

    /// Aggregate conflict counts by status and by kind.
    pub fn stats(&self) -> Result<ConflictStats> {
        let mut stats = ConflictStats {
            pending: 0,
            resolved: 0,
            dismissed: 0,
            by_kind: BTreeMap::new(),
        };

        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM conflicts GROUP BY status")?;
        let by_status = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, usize>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for (status, count) in by_status {
            match ConflictStatus::from_str(&status)? {
                ConflictStatus::Pending => stats.pending = count,
                ConflictStatus::Resolved => stats.resolved = count,
                ConflictStatus::Dismissed => stats.dismissed = count,
            }
        }

        let mut stmt = self
            .conn
            .prepare("SELECT kind, COUNT(*) FROM conflicts GROUP BY kind")?;
        let by_kind = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, usize>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for (kind, count) in by_kind {
            stats.by_kind.insert(kind, count);
        }

        Ok(stats)
    }
}
