use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::ids::ObjectId;

/// A stored document. The primary key lives under `_id` as a hex string.
pub type Document = Map<String, Value>;

pub const ID_FIELD: &str = "_id";

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    Id(ObjectId),
    /// String equality on a top-level field.
    Eq { field: String, value: String },
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Fields a document inserted through an upsert on this filter starts with.
    pub fn seed_document(&self) -> Document {
        let mut doc = Document::new();
        match self {
            Filter::All => {}
            Filter::Id(id) => {
                doc.insert(ID_FIELD.to_string(), Value::String(id.to_hex()));
            }
            Filter::Eq { field, value } => {
                doc.insert(field.clone(), Value::String(value.clone()));
            }
        }
        doc
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    pub upsert: bool,
    /// Written only when the upsert inserts; never overwrites a match.
    pub set_on_insert: Document,
}

impl UpdateOptions {
    pub fn upsert() -> Self {
        Self {
            upsert: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOutcome {
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<ObjectId>,
}

#[derive(Debug, Clone)]
pub enum WriteModel {
    InsertOne(Document),
    UpdateOne {
        filter: Filter,
        update: Document,
        options: UpdateOptions,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkWriteOutcome {
    pub inserted_count: u64,
    pub matched_count: u64,
    pub modified_count: u64,
    /// Keyed by position in the submitted op list.
    pub upserted_ids: BTreeMap<usize, ObjectId>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid document id: {0}")]
    InvalidId(String),

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("corrupt document {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("bulk write stopped after {completed} operations: {source}")]
    BulkWrite {
        completed: usize,
        #[source]
        source: Box<StoreError>,
    },
}

/// The operations the rest of the crate needs from a document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_one(&self, collection: &str, filter: &Filter)
    -> Result<Option<Document>, StoreError>;

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError>;

    /// Inserts `doc`, generating an `_id` when it carries none.
    async fn insert_one(&self, collection: &str, doc: Document) -> Result<ObjectId, StoreError>;

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: Document,
        options: UpdateOptions,
    ) -> Result<UpdateOutcome, StoreError>;

    /// Ops run in order and each is atomic on its own; the first failure
    /// stops the batch and earlier ops stay applied.
    async fn bulk_write(
        &self,
        collection: &str,
        ops: Vec<WriteModel>,
    ) -> Result<BulkWriteOutcome, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Reads the `_id` of a stored document.
pub fn document_id(doc: &Document) -> Option<ObjectId> {
    doc.get(ID_FIELD)
        .and_then(Value::as_str)
        .and_then(|raw| ObjectId::parse_str(raw).ok())
}
