//! Service wrappers shared by server entry points.

mod sync;

pub use sync::SyncService;
