pub mod mapper;
pub mod repository;
pub mod sqlite;
pub mod store;

pub use repository::{Record, Repository};
pub use sqlite::SqliteStore;
pub use store::{
    BulkWriteOutcome, Document, DocumentStore, Filter, StoreError, UpdateOptions, UpdateOutcome,
    WriteModel,
};
