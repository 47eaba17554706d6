//! Database layer for Silt

mod conflict_store;
mod connection;
mod ledger;
mod migrations;
mod record_store;

pub use conflict_store::ConflictStore;
pub use connection::Database;
pub use ledger::ProcessedLedger;
pub use record_store::RecordStore;
