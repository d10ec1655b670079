use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::db::store::{Document, DocumentStore, Filter, ID_FIELD, document_id};
use crate::db::Record;
use crate::error::AppError;
use crate::ids::{ObjectId, new_id};
use crate::models::{Class, ClassProperty};

pub const REPORTS_COLLECTION: &str = "integrity_reports";

#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub generated_at: String,
    pub classes_checked: usize,
    pub properties_checked: usize,
    pub classes_missing_property: Vec<String>,
    pub properties_missing_class: Vec<String>,
}

impl IntegrityReport {
    pub fn is_consistent(&self) -> bool {
        self.classes_missing_property.is_empty() && self.properties_missing_class.is_empty()
    }
}

/// Finds ids present in only one of `classes` / `class_properties`.
/// Detection only: nothing is repaired.
pub struct IntegrityChecker {
    store: Arc<dyn DocumentStore>,
}

impl IntegrityChecker {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn scan(&self) -> Result<IntegrityReport, AppError> {
        let (classes_checked, classes_missing_property) = self
            .unmatched(Class::COLLECTION, ClassProperty::COLLECTION)
            .await?;
        let (properties_checked, properties_missing_class) = self
            .unmatched(ClassProperty::COLLECTION, Class::COLLECTION)
            .await?;

        Ok(IntegrityReport {
            id: new_id(),
            generated_at: Utc::now().to_rfc3339(),
            classes_checked,
            properties_checked,
            classes_missing_property,
            properties_missing_class,
        })
    }

    /// Scans and stores the report in `integrity_reports`.
    pub async fn run(&self) -> Result<IntegrityReport, AppError> {
        let report = self.scan().await?;

        let doc = match serde_json::to_value(&report) {
            Ok(Value::Object(doc)) => doc,
            _ => return Err(AppError::InternalServerError),
        };
        self.store.insert_one(REPORTS_COLLECTION, doc).await?;

        if report.is_consistent() {
            info!(
                "integrity check passed ({} classes, {} properties)",
                report.classes_checked, report.properties_checked
            );
        } else {
            warn!(
                "integrity check found {} classes without properties, {} properties without classes",
                report.classes_missing_property.len(),
                report.properties_missing_class.len()
            );
        }
        Ok(report)
    }

    /// Ids in `source` with no document of the same id in `target`.
    async fn unmatched(
        &self,
        source: &str,
        target: &str,
    ) -> Result<(usize, Vec<String>), AppError> {
        let docs = self.store.find(source, &Filter::All).await?;
        let mut missing = Vec::new();

        for doc in &docs {
            match document_id(doc) {
                Some(id) => {
                    if self.store.find_one(target, &Filter::Id(id)).await?.is_none() {
                        missing.push(id.to_hex());
                    }
                }
                None => {
                    warn!("{}: document with unreadable id {}", source, raw_id(doc));
                    missing.push(raw_id(doc));
                }
            }
        }

        Ok((docs.len(), missing))
    }
}

fn raw_id(doc: &Document) -> String {
    match doc.get(ID_FIELD) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}
