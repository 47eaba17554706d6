//! Data models for Silt

mod conflict;
mod operation;
mod record;

pub use conflict::{Conflict, ConflictFilter, ConflictStats, ConflictStatus, Resolution};
pub use operation::{
    Action, OperationPayload, OperationResult, ResultStatus, SyncOperation, SyncReport,
    SyncSummary, ALREADY_PROCESSED,
};
pub use record::{Kind, Record, RecordPatch, TodoStatus};
