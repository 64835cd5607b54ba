// ============================================================================
// Interfaces Module
// Contains all trait definitions and contracts
// ============================================================================

mod bulk_record;
mod event_handler;
mod storage_port;

pub use bulk_record::BulkRecord;
pub use event_handler::{
    BulkEvent, EventHandler, LoggingEventHandler, NoOpEventHandler, RecordingEventHandler,
};
pub use storage_port::{
    BulkWriteResult, InsertManyResult, PersistenceError, RecordFilter, StoragePort, WriteError,
    WriteOperation, WriteOutcome,
};
