//! Shared sync service wrapping the database for the API layer.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{ConflictStore, Database};
use crate::error::Result;
use crate::models::{
    Conflict, ConflictFilter, ConflictStats, RecordPatch, Resolution, SyncOperation, SyncReport,
};
use crate::sync::{processor, resolver};

/// Thread-safe service over the sync engine.
///
/// The inner mutex is the serialization point for every mutating unit of
/// work. It is acquired per operation and released before the next one, so
/// concurrent batches interleave between transactions while each
/// read-check-write tuple stays atomic. The guarded work is synchronous
/// `SQLite` I/O; the lock is never held across a foreign suspension point.
#[derive(Clone)]
pub struct SyncService {
    db: Arc<Mutex<Database>>,
}

impl SyncService {
    /// Open a service over a database at the given filesystem path.
    ///
    /// Accepts `:memory:` for an ephemeral database.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path)?;
        tracing::info!("Opened sync database at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Open a service over an in-memory database (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Apply a batch of operations sequentially, in input order.
    ///
    /// Never fails as a whole: per-operation failures become ERROR results.
    pub async fn process_batch(&self, operations: &[SyncOperation]) -> SyncReport {
        let mut results = Vec::with_capacity(operations.len());
        for operation in operations {
            let mut db = self.db.lock().await;
            results.push(processor::process_operation(db.connection_mut(), operation));
        }
        SyncReport::new(results)
    }

    /// Resolve a PENDING conflict with the given choice.
    pub async fn resolve_conflict(
        &self,
        conflict_id: &str,
        choice: Resolution,
        custom_data: Option<RecordPatch>,
    ) -> Result<Conflict> {
        let mut db = self.db.lock().await;
        resolver::resolve(db.connection_mut(), conflict_id, choice, custom_data)
    }

    /// Dismiss a PENDING conflict.
    pub async fn dismiss_conflict(&self, conflict_id: &str) -> Result<Conflict> {
        let mut db = self.db.lock().await;
        resolver::dismiss(db.connection_mut(), conflict_id)
    }

    /// Fetch one conflict by id.
    pub async fn get_conflict(&self, conflict_id: &str) -> Result<Option<Conflict>> {
        let db = self.db.lock().await;
        ConflictStore::new(db.connection()).get(conflict_id)
    }

    /// List conflicts matching the filter, newest first.
    pub async fn list_conflicts(&self, filter: &ConflictFilter) -> Result<Vec<Conflict>> {
        let db = self.db.lock().await;
        ConflictStore::new(db.connection()).list(filter)
    }

    /// Aggregate conflict counts.
    pub async fn conflict_stats(&self) -> Result<ConflictStats> {
        let db = self.db.lock().await;
        ConflictStore::new(db.connection()).stats()
    }
}
