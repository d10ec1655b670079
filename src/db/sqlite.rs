use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::info;

use crate::db::store::{
    BulkWriteOutcome, Document, DocumentStore, Filter, ID_FIELD, StoreError, UpdateOptions,
    UpdateOutcome, WriteModel,
};
use crate::ids::{ObjectId, new_id};

/// Document store on a single SQLite table keyed by `(collection, id)`.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

enum Applied {
    Inserted,
    Updated(UpdateOutcome),
}

impl SqliteStore {
    pub async fn open(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        info!("opened document store at {}", database_url);
        Self::migrate(pool).await
    }

    /// Every connection to `:memory:` is its own database, so the pool is
    /// pinned to one connection that never expires.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("document store closed");
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let row = fetch_rows(&mut conn, collection, filter, Some(1))
            .await?
            .into_iter()
            .next();

        row.map(|(id, body)| parse_body(&id, &body)).transpose()
    }

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        fetch_rows(&mut conn, collection, filter, None)
            .await?
            .iter()
            .map(|(id, body)| parse_body(id, body))
            .collect()
    }

    async fn insert_one(&self, collection: &str, doc: Document) -> Result<ObjectId, StoreError> {
        let mut conn = self.pool.acquire().await?;
        insert_document(&mut conn, collection, doc).await
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: Document,
        options: UpdateOptions,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut tx = self.begin_write().await?;
        let outcome = update_document(&mut tx, collection, filter, update, options).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    async fn bulk_write(
        &self,
        collection: &str,
        ops: Vec<WriteModel>,
    ) -> Result<BulkWriteOutcome, StoreError> {
        let mut outcome = BulkWriteOutcome::default();

        for (index, op) in ops.into_iter().enumerate() {
            let applied = self.apply(collection, op).await.map_err(|source| {
                StoreError::BulkWrite {
                    completed: index,
                    source: Box::new(source),
                }
            })?;

            match applied {
                Applied::Inserted => outcome.inserted_count += 1,
                Applied::Updated(update) => {
                    outcome.matched_count += update.matched_count;
                    outcome.modified_count += update.modified_count;
                    if let Some(id) = update.upserted_id {
                        outcome.upserted_ids.insert(index, id);
                    }
                }
            }
        }

        Ok(outcome)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("select 1").execute(&self.pool).await?;
        Ok(())
    }
}

impl SqliteStore {
    /// Updates read before they write, so the write lock is taken at `BEGIN`.
    /// Upgrading a deferred read lock fails with `SQLITE_BUSY` under
    /// concurrent writers instead of waiting.
    async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>, StoreError> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    // One transaction per op: each record is atomic, the batch is not.
    async fn apply(&self, collection: &str, op: WriteModel) -> Result<Applied, StoreError> {
        let mut tx = self.begin_write().await?;
        let applied = match op {
            WriteModel::InsertOne(doc) => {
                insert_document(&mut tx, collection, doc).await?;
                Applied::Inserted
            }
            WriteModel::UpdateOne {
                filter,
                update,
                options,
            } => Applied::Updated(update_document(&mut tx, collection, &filter, update, options).await?),
        };
        tx.commit().await?;
        Ok(applied)
    }
}

async fn fetch_rows(
    conn: &mut SqliteConnection,
    collection: &str,
    filter: &Filter,
    limit: Option<u32>,
) -> Result<Vec<(String, String)>, StoreError> {
    let mut sql = String::from("SELECT id, body FROM documents WHERE collection = ?");
    match filter {
        Filter::All => {}
        Filter::Id(_) => sql.push_str(" AND id = ?"),
        Filter::Eq { .. } => sql.push_str(" AND json_extract(body, ?) = ?"),
    }
    sql.push_str(" ORDER BY id");
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    let query = sqlx::query_as::<_, (String, String)>(&sql).bind(collection);
    let query = match filter {
        Filter::All => query,
        Filter::Id(id) => query.bind(id.to_hex()),
        Filter::Eq { field, value } => query
            .bind(format!("$.\"{field}\""))
            .bind(value.clone()),
    };

    Ok(query.fetch_all(&mut *conn).await?)
}

fn parse_body(id: &str, body: &str) -> Result<Document, StoreError> {
    match serde_json::from_str::<Value>(body)? {
        Value::Object(doc) => Ok(doc),
        _ => Err(StoreError::Corrupt {
            id: id.to_string(),
            reason: "body is not a JSON object".to_string(),
        }),
    }
}

async fn insert_document(
    conn: &mut SqliteConnection,
    collection: &str,
    mut doc: Document,
) -> Result<ObjectId, StoreError> {
    let id = match doc.get(ID_FIELD) {
        None | Some(Value::Null) => new_id(),
        Some(Value::String(raw)) => {
            ObjectId::parse_str(raw).map_err(|e| StoreError::InvalidId(format!("{raw}: {e}")))?
        }
        Some(other) => return Err(StoreError::InvalidId(other.to_string())),
    };
    doc.insert(ID_FIELD.to_string(), Value::String(id.to_hex()));
    let body = serde_json::to_string(&doc)?;

    sqlx::query("INSERT INTO documents (collection, id, body) VALUES (?, ?, ?)")
        .bind(collection)
        .bind(id.to_hex())
        .bind(body)
        .execute(&mut *conn)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                StoreError::DuplicateKey(id.to_hex())
            }
            other => StoreError::Database(other),
        })?;

    Ok(id)
}

async fn update_document(
    conn: &mut SqliteConnection,
    collection: &str,
    filter: &Filter,
    mut update: Document,
    options: UpdateOptions,
) -> Result<UpdateOutcome, StoreError> {
    // `_id` is immutable once assigned.
    update.remove(ID_FIELD);

    let existing = fetch_rows(conn, collection, filter, Some(1))
        .await?
        .into_iter()
        .next();

    match existing {
        Some((id, body)) => {
            let mut doc = parse_body(&id, &body)?;
            let mut changed = false;
            for (key, value) in update {
                if doc.get(&key) != Some(&value) {
                    doc.insert(key, value);
                    changed = true;
                }
            }

            if changed {
                sqlx::query("UPDATE documents SET body = ? WHERE collection = ? AND id = ?")
                    .bind(serde_json::to_string(&doc)?)
                    .bind(collection)
                    .bind(&id)
                    .execute(&mut *conn)
                    .await?;
            }

            Ok(UpdateOutcome {
                matched_count: 1,
                modified_count: u64::from(changed),
                upserted_id: None,
            })
        }
        None if options.upsert => {
            let mut doc = options.set_on_insert;
            doc.extend(filter.seed_document());
            doc.extend(update);
            let id = insert_document(conn, collection, doc).await?;
            Ok(UpdateOutcome {
                matched_count: 0,
                modified_count: 0,
                upserted_id: Some(id),
            })
        }
        None => Ok(UpdateOutcome::default()),
    }
}
