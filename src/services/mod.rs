pub mod bulk_sync;
pub mod integrity;
pub mod scheduler;

pub use bulk_sync::{BulkMode, BulkReport, BulkSyncEngine, ItemOutcome};
pub use integrity::{IntegrityChecker, IntegrityReport};
pub use scheduler::IntegrityScheduler;
