//! silt-core - Core library for Silt
//!
//! This crate contains the shared models, database layer, sync batch
//! processor, and conflict resolution engine behind the Silt sync API.

pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{
    Action, Conflict, ConflictFilter, ConflictStats, ConflictStatus, Kind, OperationPayload,
    OperationResult, Record, RecordPatch, Resolution, ResultStatus, SyncOperation, SyncReport,
    SyncSummary, TodoStatus,
};
pub use services::SyncService;
