use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::db::store::{DocumentStore, Filter, ID_FIELD, UpdateOptions, WriteModel};
use crate::db::Record;
use crate::error::AppError;
use crate::ids::{ObjectId, new_id, to_internal_id};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkMode {
    /// Every valid record becomes an insert; an existing id is a batch failure.
    Insert,
    /// Records with an id are upserted; records without one are created.
    Upsert,
}

/// Outcome for one input record, in input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    Inserted { id: ObjectId },
    Updated { id: ObjectId },
    Skipped { reason: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkReport {
    pub success: bool,
    pub inserted_count: u64,
    pub modified_count: u64,
    /// Input index -> id generated for records that arrived without one.
    pub inserted_ids: BTreeMap<usize, ObjectId>,
    pub results: Vec<ItemOutcome>,
}

impl BulkReport {
    pub fn skipped_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r, ItemOutcome::Skipped { .. }))
            .count()
    }
}

enum Entry {
    Queued(ObjectId),
    Skipped(String),
}

/// Batch importer for one collection: assigns ids, skips malformed records,
/// and submits the rest as a single bulk write.
pub struct BulkSyncEngine<R> {
    store: Arc<dyn DocumentStore>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> BulkSyncEngine<R> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _record: PhantomData,
        }
    }

    pub async fn sync(&self, batch: Value, mode: BulkMode) -> Result<BulkReport, AppError> {
        let items = match batch {
            Value::Array(items) if !items.is_empty() => items,
            Value::Array(_) => {
                return Err(AppError::Validation("batch must not be empty".to_string()));
            }
            _ => {
                return Err(AppError::Validation("batch must be a JSON array".to_string()));
            }
        };

        let total = items.len();
        let mut inserted_ids = BTreeMap::new();
        let mut entries = Vec::with_capacity(total);
        let mut ops = Vec::with_capacity(total);

        for (index, item) in items.into_iter().enumerate() {
            let Value::Object(doc) = item else {
                warn!("{}: skipping record {}: not a JSON object", R::COLLECTION, index);
                entries.push(Entry::Skipped("record is not a JSON object".to_string()));
                continue;
            };

            let id = match doc.get(ID_FIELD) {
                None | Some(Value::Null) => {
                    let id = new_id();
                    inserted_ids.insert(index, id);
                    id
                }
                Some(Value::String(raw)) => match to_internal_id(raw) {
                    Ok(id) => id,
                    Err(e) => {
                        warn!("{}: skipping record {}: {}", R::COLLECTION, index, e);
                        entries.push(Entry::Skipped(format!("invalid identifier: {}", e)));
                        continue;
                    }
                },
                Some(_) => {
                    warn!("{}: skipping record {}: non-string _id", R::COLLECTION, index);
                    entries.push(Entry::Skipped("identifier must be a string".to_string()));
                    continue;
                }
            };

            let op = match mode {
                BulkMode::Insert => {
                    let mut record = R::from_document(&doc).to_document();
                    record.insert(ID_FIELD.to_string(), Value::String(id.to_hex()));
                    WriteModel::InsertOne(record)
                }
                // Existing records get only the supplied fields; new ones are
                // stored in full shape, the same as an insert.
                BulkMode::Upsert => WriteModel::UpdateOne {
                    filter: Filter::Id(id),
                    update: R::project(&doc),
                    options: UpdateOptions {
                        upsert: true,
                        set_on_insert: R::from_document(&doc).to_document(),
                    },
                },
            };
            ops.push(op);
            entries.push(Entry::Queued(id));
        }

        let queued = ops.len();
        info!(
            "{}: bulk {:?} of {} records ({} queued, {} skipped)",
            R::COLLECTION,
            mode,
            total,
            queued,
            total - queued
        );

        if ops.is_empty() {
            let results = entries.into_iter().map(Entry::into_skipped).collect();
            return Ok(BulkReport {
                success: false,
                inserted_count: 0,
                modified_count: 0,
                inserted_ids: BTreeMap::new(),
                results,
            });
        }

        let outcome = self.store.bulk_write(R::COLLECTION, ops).await?;

        let mut op_index = 0;
        let results = entries
            .into_iter()
            .map(|entry| match entry {
                Entry::Skipped(reason) => ItemOutcome::Skipped { reason },
                Entry::Queued(id) => {
                    let created = mode == BulkMode::Insert
                        || outcome.upserted_ids.contains_key(&op_index);
                    op_index += 1;
                    if created {
                        ItemOutcome::Inserted { id }
                    } else {
                        ItemOutcome::Updated { id }
                    }
                }
            })
            .collect();

        Ok(BulkReport {
            success: true,
            inserted_count: outcome.inserted_count + outcome.upserted_ids.len() as u64,
            modified_count: outcome.modified_count,
            inserted_ids,
            results,
        })
    }
}

impl Entry {
    fn into_skipped(self) -> ItemOutcome {
        match self {
            Entry::Skipped(reason) => ItemOutcome::Skipped { reason },
            // Only reached when nothing was queued.
            Entry::Queued(id) => ItemOutcome::Skipped {
                reason: format!("{} was not written", id),
            },
        }
    }
}
