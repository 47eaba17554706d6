//! Conflict resolution engine.

use rusqlite::Connection;

use crate::db::{ConflictStore, RecordStore};
use crate::error::{Error, Result};
use crate::models::{Conflict, ConflictStatus, RecordPatch, Resolution};

/// Resolve a PENDING conflict by applying the chosen payload.
///
/// The selected fields are written through `force_update`, bypassing version
/// checks: the conflict itself is the authority over what current state
/// should become, and the bumped version supersedes both sides. Resolution
/// carries no operation id and never touches the idempotency ledger.
pub fn resolve(
    conn: &mut Connection,
    conflict_id: &str,
    choice: Resolution,
    custom_data: Option<RecordPatch>,
) -> Result<Conflict> {
    let tx = conn.transaction()?;

    let conflicts = ConflictStore::new(&tx);
    let conflict = conflicts
        .get(conflict_id)?
        .ok_or_else(|| Error::NotFound(format!("conflict {conflict_id}")))?;
    if conflict.status != ConflictStatus::Pending {
        return Err(Error::IllegalTransition(format!(
            "conflict {conflict_id} is {}, only PENDING can be resolved",
            conflict.status
        )));
    }

    let patch = match choice {
        Resolution::Client => Some(conflict.client_data.as_patch()),
        // SERVER over an absent record has nothing to reinstate; the
        // mutation is dismissed at the record level but the conflict is
        // still marked resolved.
        Resolution::Server => conflict.server_data.as_ref().map(RecordPatch::from_record),
        Resolution::Custom => Some(custom_data.ok_or_else(|| {
            Error::InvalidInput("resolvedData is required for CUSTOM resolution".to_string())
        })?),
    };

    let applied = match patch {
        Some(patch) => {
            let records = RecordStore::new(&tx);
            Some(records.force_update(conflict.kind, &conflict.record_id, &patch)?)
        }
        None => None,
    };

    let resolved = conflicts.transition_to_resolved(conflict_id, applied.as_ref())?;
    tx.commit()?;

    tracing::info!(
        conflict_id = %conflict_id,
        choice = ?choice,
        record_id = %resolved.record_id,
        "conflict resolved"
    );
    Ok(resolved)
}

/// Dismiss a PENDING conflict without touching the record.
pub fn dismiss(conn: &mut Connection, conflict_id: &str) -> Result<Conflict> {
    let tx = conn.transaction()?;
    let dismissed = ConflictStore::new(&tx).transition_to_dismissed(conflict_id)?;
    tx.commit()?;

    tracing::info!(conflict_id = %conflict_id, "conflict dismissed");
    Ok(dismissed)
}
