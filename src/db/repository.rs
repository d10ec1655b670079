use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::db::mapper;
use crate::db::store::{
    Document, DocumentStore, Filter, ID_FIELD, StoreError, UpdateOptions, UpdateOutcome,
};
use crate::error::AppError;
use crate::ids::{ObjectId, new_id, to_internal_id};
use crate::models::{Class, ClassProperty, Tag, UserSettings};

/// A domain record stored as one document in a named collection.
pub trait Record: Serialize + Send + Sync + Sized + 'static {
    const COLLECTION: &'static str;

    /// Fields a client may write through partial updates.
    const FIELDS: &'static [&'static str];

    fn from_document(doc: &Document) -> Self;

    fn to_document(&self) -> Document;

    /// Keeps the writable fields present in `fields`, normalized by the mapper.
    fn project(fields: &Document) -> Document {
        Self::from_document(fields)
            .to_document()
            .into_iter()
            .filter(|(key, _)| Self::FIELDS.contains(&key.as_str()) && fields.contains_key(key))
            .collect()
    }
}

impl Record for Class {
    const COLLECTION: &'static str = "classes";
    const FIELDS: &'static [&'static str] = &[
        "associated_properties",
        "catalog_num",
        "class_num",
        "session",
        "course_subject",
        "course_num",
        "section",
        "title",
        "location",
        "min_units",
        "max_units",
        "enrollment_cap",
        "waitlist_cap",
    ];

    fn from_document(doc: &Document) -> Self {
        mapper::to_class(doc)
    }

    fn to_document(&self) -> Document {
        mapper::from_class(self)
    }
}

impl Record for ClassProperty {
    const COLLECTION: &'static str = "class_properties";
    const FIELDS: &'static [&'static str] = &[
        "associated_class",
        "class_status",
        "start_time",
        "end_time",
        "room",
        "facility_id",
        "days",
        "start_date",
        "end_date",
        "instructor_email",
        "instructor_name",
        "total_enrolled",
        "total_waitlisted",
    ];

    fn from_document(doc: &Document) -> Self {
        mapper::to_class_property(doc)
    }

    fn to_document(&self) -> Document {
        mapper::from_class_property(self)
    }
}

impl Record for Tag {
    const COLLECTION: &'static str = "tags";
    const FIELDS: &'static [&'static str] = &["name", "classes"];

    fn from_document(doc: &Document) -> Self {
        mapper::to_tag(doc)
    }

    fn to_document(&self) -> Document {
        mapper::from_tag(self)
    }
}

impl Record for UserSettings {
    const COLLECTION: &'static str = "settings";
    // `email` comes from the session, never from a request body.
    const FIELDS: &'static [&'static str] =
        &["theme", "calendar_start", "calendar_end", "hidden_days"];

    fn from_document(doc: &Document) -> Self {
        mapper::to_settings(doc)
    }

    fn to_document(&self) -> Document {
        mapper::from_settings(self)
    }
}

/// Single-record access to one collection.
pub struct Repository<R> {
    store: Arc<dyn DocumentStore>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> Repository<R> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _record: PhantomData,
        }
    }

    /// A malformed id is an error; an absent record is `Ok(None)`.
    pub async fn get(&self, raw_id: &str) -> Result<Option<R>, AppError> {
        let id = to_internal_id(raw_id)?;
        let doc = self.store.find_one(R::COLLECTION, &Filter::Id(id)).await?;
        Ok(doc.as_ref().map(R::from_document))
    }

    pub async fn list(&self) -> Result<Vec<R>, AppError> {
        let docs = self.store.find(R::COLLECTION, &Filter::All).await?;
        Ok(docs.iter().map(R::from_document).collect())
    }

    pub async fn find_by(&self, field: &str, value: &str) -> Result<Option<R>, AppError> {
        let doc = self
            .store
            .find_one(R::COLLECTION, &Filter::eq(field, value))
            .await?;
        Ok(doc.as_ref().map(R::from_document))
    }

    /// Stores a new record. A caller-supplied `_id` is validated and kept so
    /// the same id can be shared across collections.
    pub async fn create(&self, mut doc: Document) -> Result<ObjectId, AppError> {
        let id = match doc.remove(ID_FIELD) {
            None | Some(Value::Null) => new_id(),
            Some(Value::String(raw)) => to_internal_id(&raw)?,
            Some(_) => return Err(AppError::Validation("_id must be a string".to_string())),
        };

        let mut record = R::from_document(&doc).to_document();
        record.insert(ID_FIELD.to_string(), Value::String(id.to_hex()));

        match self.store.insert_one(R::COLLECTION, record).await {
            Ok(id) => Ok(id),
            Err(StoreError::DuplicateKey(key)) => Err(AppError::Conflict(format!(
                "{} already has a record with id {}",
                R::COLLECTION,
                key
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes only the supplied fields, creating the record when absent.
    pub async fn upsert(&self, raw_id: &str, fields: &Document) -> Result<UpdateOutcome, AppError> {
        let id = to_internal_id(raw_id)?;
        self.upsert_where(Filter::Id(id), fields).await
    }

    pub async fn upsert_where(
        &self,
        filter: Filter,
        fields: &Document,
    ) -> Result<UpdateOutcome, AppError> {
        self.upsert_with_defaults(filter, fields, Document::new())
            .await
    }

    /// Like [`upsert_where`](Self::upsert_where), but a newly created record
    /// starts from `defaults` before the supplied fields are applied.
    pub async fn upsert_with_defaults(
        &self,
        filter: Filter,
        fields: &Document,
        defaults: Document,
    ) -> Result<UpdateOutcome, AppError> {
        let update = Self::writable(fields)?;
        let options = UpdateOptions {
            upsert: true,
            set_on_insert: defaults,
        };
        let outcome = self
            .store
            .update_one(R::COLLECTION, &filter, update, options)
            .await?;
        Ok(outcome)
    }

    /// Updates an existing record and returns it as stored afterwards.
    pub async fn update_returning(
        &self,
        raw_id: &str,
        fields: &Document,
    ) -> Result<Option<R>, AppError> {
        let id = to_internal_id(raw_id)?;
        let update = Self::writable(fields)?;
        let outcome = self
            .store
            .update_one(R::COLLECTION, &Filter::Id(id), update, UpdateOptions::default())
            .await?;
        if outcome.matched_count == 0 {
            return Ok(None);
        }

        let doc = self.store.find_one(R::COLLECTION, &Filter::Id(id)).await?;
        Ok(doc.as_ref().map(R::from_document))
    }

    fn writable(fields: &Document) -> Result<Document, AppError> {
        let update = R::project(fields);
        if update.is_empty() {
            return Err(AppError::Validation(format!(
                "no writable fields for {}",
                R::COLLECTION
            )));
        }
        Ok(update)
    }
}
