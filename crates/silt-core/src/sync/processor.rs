//! Sync batch processor: applies client operations against authoritative state.

use rusqlite::Connection;

use crate::db::{ConflictStore, ProcessedLedger, RecordStore};
use crate::error::{Error, Result};
use crate::models::{
    Action, Conflict, OperationResult, Record, SyncOperation, SyncReport, ALREADY_PROCESSED,
};

/// Process an ordered batch of operations sequentially.
///
/// One result per input, same order. Failures stay local to their operation;
/// a batch never aborts part-way on a sibling's error.
pub fn process_batch(conn: &mut Connection, operations: &[SyncOperation]) -> SyncReport {
    let results = operations
        .iter()
        .map(|operation| process_operation(conn, operation))
        .collect();
    SyncReport::new(results)
}

/// Process one operation inside its own transaction.
///
/// Expected outcomes (applied, conflict recorded, replay sentinel, duplicate
/// create) commit; unexpected internal failures roll back and surface as an
/// ERROR result with no partial writes.
pub fn process_operation(conn: &mut Connection, operation: &SyncOperation) -> OperationResult {
    match apply(conn, operation) {
        Ok(result) => result,
        Err(error) => {
            tracing::error!(
                operation_id = %operation.operation_id,
                %error,
                "sync operation failed, rolled back"
            );
            OperationResult::error(&operation.operation_id, error.to_string())
        }
    }
}

fn apply(conn: &mut Connection, operation: &SyncOperation) -> Result<OperationResult> {
    let tx = conn.transaction()?;
    let result = execute(&tx, operation)?;
    tx.commit()?;
    Ok(result)
}

fn execute(conn: &Connection, operation: &SyncOperation) -> Result<OperationResult> {
    // Replays are rejected before any read of the record: the ledger is the
    // sole idempotency authority even after the record has moved on.
    let ledger = ProcessedLedger::new(conn);
    if ledger.seen(&operation.operation_id)? {
        return Ok(OperationResult::error(
            &operation.operation_id,
            ALREADY_PROCESSED,
        ));
    }

    match operation.action {
        Action::Create => execute_create(conn, operation),
        Action::Update => execute_update(conn, operation),
        Action::Delete => execute_delete(conn, operation),
    }
}

fn execute_create(conn: &Connection, operation: &SyncOperation) -> Result<OperationResult> {
    let payload = &operation.data;
    let Some(title) = payload
        .title
        .as_deref()
        .map(str::trim)
        .filter(|title| !title.is_empty())
    else {
        return Ok(OperationResult::error(
            &operation.operation_id,
            "title is required",
        ));
    };

    let record = Record::new(&payload.id, title, payload.content.clone(), payload.status);
    let store = RecordStore::new(conn);
    match store.insert(operation.kind, &record) {
        Ok(()) => {}
        Err(Error::Duplicate(_)) => {
            // Same operationId was filtered above; this is a different
            // operation reusing a taken id, a client bug rather than a
            // version conflict.
            return Ok(OperationResult::error(
                &operation.operation_id,
                format!("duplicate id: {}", payload.id),
            ));
        }
        Err(e) => return Err(e),
    }

    ProcessedLedger::new(conn).record(&operation.operation_id, operation.action, operation.kind)?;
    Ok(OperationResult::applied(&operation.operation_id, record))
}

fn execute_update(conn: &Connection, operation: &SyncOperation) -> Result<OperationResult> {
    let payload = &operation.data;
    let Some(client_version) = payload.version else {
        return Ok(OperationResult::error(
            &operation.operation_id,
            "version is required",
        ));
    };

    let store = RecordStore::new(conn);
    let current = store.get(operation.kind, &payload.id)?;

    match current {
        None => record_conflict(conn, operation, None),
        Some(server) if server.is_tombstone() || server.version != client_version => {
            // Updating a tombstone is a conflict, not a resurrection.
            record_conflict(conn, operation, Some(server))
        }
        Some(_) => {
            let updated = store.update_if_version(
                operation.kind,
                &payload.id,
                client_version,
                &payload.as_patch(),
            )?;
            match updated {
                Some(record) => {
                    ProcessedLedger::new(conn).record(
                        &operation.operation_id,
                        operation.action,
                        operation.kind,
                    )?;
                    Ok(OperationResult::applied(&operation.operation_id, record))
                }
                // The coordinator serializes operations, so losing the CAS
                // after a matching read should not happen; defend anyway.
                None => Ok(OperationResult::error(
                    &operation.operation_id,
                    "race: version changed during apply",
                )),
            }
        }
    }
}

fn execute_delete(conn: &Connection, operation: &SyncOperation) -> Result<OperationResult> {
    let payload = &operation.data;
    let Some(client_version) = payload.version else {
        return Ok(OperationResult::error(
            &operation.operation_id,
            "version is required",
        ));
    };

    let store = RecordStore::new(conn);
    let current = store.get(operation.kind, &payload.id)?;

    match current {
        // Tolerant delete: deleting something already gone is success, and
        // it still earns a ledger entry so a retry stays idempotent.
        None => {
            ProcessedLedger::new(conn).record(
                &operation.operation_id,
                operation.action,
                operation.kind,
            )?;
            Ok(OperationResult::applied_with_message(
                &operation.operation_id,
                "already deleted",
            ))
        }
        Some(server) if server.is_tombstone() => {
            ProcessedLedger::new(conn).record(
                &operation.operation_id,
                operation.action,
                operation.kind,
            )?;
            Ok(OperationResult::applied_with_message(
                &operation.operation_id,
                "already deleted",
            ))
        }
        Some(server) if server.version != client_version => {
            record_conflict(conn, operation, Some(server))
        }
        Some(_) => {
            let tombstone =
                store.soft_delete_if_version(operation.kind, &payload.id, client_version)?;
            match tombstone {
                Some(record) => {
                    ProcessedLedger::new(conn).record(
                        &operation.operation_id,
                        operation.action,
                        operation.kind,
                    )?;
                    Ok(OperationResult::applied(&operation.operation_id, record))
                }
                None => Ok(OperationResult::error(
                    &operation.operation_id,
                    "race: version changed during apply",
                )),
            }
        }
    }
}

/// Persist conflict evidence and emit the CONFLICT result.
///
/// Conflicts are keyed by operation id, so a replayed operation that
/// conflicts again finds its existing row; that is the same terminal answer,
/// not an error.
fn record_conflict(
    conn: &Connection,
    operation: &SyncOperation,
    server_data: Option<Record>,
) -> Result<OperationResult> {
    let conflict = Conflict::detected(
        &operation.operation_id,
        operation.kind,
        server_data,
        operation.data.clone(),
    );

    let store = ConflictStore::new(conn);
    match store.create(&conflict) {
        Ok(()) => {
            tracing::info!(
                operation_id = %operation.operation_id,
                kind = %operation.kind,
                record_id = %conflict.record_id,
                server_version = conflict.server_version,
                client_version = conflict.client_version,
                "version conflict recorded"
            );
        }
        Err(Error::Duplicate(_)) => {
            tracing::debug!(
                operation_id = %operation.operation_id,
                "conflict already recorded for replayed operation"
            );
        }
        Err(e) => return Err(e),
    }

    Ok(OperationResult::conflict(
        &operation.operation_id,
        &conflict.id,
    ))
}
