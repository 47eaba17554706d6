//! Client sync operations and their per-operation results.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::models::record::{Kind, Record, RecordPatch, TodoStatus};

/// Client mutation action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Create,
    Update,
    Delete,
}

impl Action {
    /// The stable string tag for this action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(Self::Create),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            other => Err(Error::InvalidInput(format!("Unknown action: {other}"))),
        }
    }
}

/// Payload of an operation.
///
/// CREATE carries the full client-owned field set; UPDATE carries `version`
/// plus the mutated fields; DELETE carries only `id` and `version`. Fields
/// the server owns (`createdAt`, `updatedAt`, `deletedAt`, and `version` on
/// CREATE) are not admitted here and are ignored if a client sends them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationPayload {
    /// Record identifier
    pub id: String,
    /// Client's known record version (UPDATE/DELETE)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TodoStatus>,
}

impl OperationPayload {
    /// The mutated-fields view of this payload.
    #[must_use]
    pub fn as_patch(&self) -> RecordPatch {
        RecordPatch {
            title: self.title.clone(),
            content: self.content.clone(),
            status: self.status,
        }
    }
}

/// One unit of client intent from an offline outbox.
///
/// `operation_id` is the idempotency key and, on conflict, the conflict's
/// primary key. The wire field for the kind is `table`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOperation {
    pub operation_id: String,
    pub action: Action,
    #[serde(rename = "table")]
    pub kind: Kind,
    pub data: OperationPayload,
}

/// Terminal status of one processed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResultStatus {
    Applied,
    Conflict,
    Error,
}

/// Sentinel message for an idempotent replay; the client treats this as
/// "already applied, safe to drop from outbox".
pub const ALREADY_PROCESSED: &str = "Operation already processed";

/// Per-operation outcome returned to the client, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub operation_id: String,
    pub status: ResultStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict_id: Option<String>,
}

impl OperationResult {
    /// Successful application carrying the new record state.
    #[must_use]
    pub fn applied(operation_id: impl Into<String>, record: Record) -> Self {
        Self {
            operation_id: operation_id.into(),
            status: ResultStatus::Applied,
            message: None,
            data: Some(record),
            conflict_id: None,
        }
    }

    /// Successful application with an explanatory message and no record
    /// snapshot (the tolerant-delete path).
    #[must_use]
    pub fn applied_with_message(
        operation_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation_id: operation_id.into(),
            status: ResultStatus::Applied,
            message: Some(message.into()),
            data: None,
            conflict_id: None,
        }
    }

    /// Version conflict; a conflict record with `conflict_id` was persisted.
    #[must_use]
    pub fn conflict(operation_id: impl Into<String>, conflict_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            status: ResultStatus::Conflict,
            message: None,
            data: None,
            conflict_id: Some(conflict_id.into()),
        }
    }

    /// Terminal error local to this operation.
    #[must_use]
    pub fn error(operation_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            status: ResultStatus::Error,
            message: Some(message.into()),
            data: None,
            conflict_id: None,
        }
    }
}

/// Batch-level tallies over a result vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub total: usize,
    pub applied: usize,
    pub conflicts: usize,
    pub errors: usize,
}

impl SyncSummary {
    /// Tally a result vector.
    #[must_use]
    pub fn tally(results: &[OperationResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            applied: 0,
            conflicts: 0,
            errors: 0,
        };
        for result in results {
            match result.status {
                ResultStatus::Applied => summary.applied += 1,
                ResultStatus::Conflict => summary.conflicts += 1,
                ResultStatus::Error => summary.errors += 1,
            }
        }
        summary
    }
}

/// The full outcome of one batch: per-operation results plus the summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub results: Vec<OperationResult>,
    pub summary: SyncSummary,
}

impl SyncReport {
    /// Build a report, tallying the summary from the results.
    #[must_use]
    pub fn new(results: Vec<OperationResult>) -> Self {
        let summary = SyncSummary::tally(&results);
        Self { results, summary }
    }
}
