//! Projection between stored documents and the domain records.
//!
//! Reading never fails: absent or unusable fields fall back to an empty
//! string or an empty list. Catalog fields keep the JSON type they were
//! written with; list items and settings are read as text.

use serde_json::Value;

use crate::db::store::{Document, ID_FIELD, document_id};
use crate::ids::ObjectId;
use crate::models::{Class, ClassProperty, Scalar, Tag, UserSettings};

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn text(doc: &Document, key: &str) -> String {
    doc.get(key).and_then(scalar_text).unwrap_or_default()
}

fn scalar(doc: &Document, key: &str) -> Scalar {
    doc.get(key).and_then(Scalar::from_value).unwrap_or_default()
}

fn list(doc: &Document, key: &str) -> Vec<String> {
    match doc.get(key) {
        Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

struct Writer(Document);

impl Writer {
    fn new(id: Option<ObjectId>) -> Self {
        let mut doc = Document::new();
        if let Some(id) = id {
            doc.insert(ID_FIELD.to_string(), Value::String(id.to_hex()));
        }
        Self(doc)
    }

    fn text(mut self, key: &str, value: &str) -> Self {
        self.0.insert(key.to_string(), Value::String(value.to_string()));
        self
    }

    fn scalar(mut self, key: &str, value: &Scalar) -> Self {
        self.0.insert(key.to_string(), value.to_value());
        self
    }

    fn list(mut self, key: &str, values: &[String]) -> Self {
        let items = values.iter().cloned().map(Value::String).collect();
        self.0.insert(key.to_string(), Value::Array(items));
        self
    }

    fn finish(self) -> Document {
        self.0
    }
}

pub fn to_class(doc: &Document) -> Class {
    Class {
        id: document_id(doc),
        associated_properties: scalar(doc, "associated_properties"),
        catalog_num: scalar(doc, "catalog_num"),
        class_num: scalar(doc, "class_num"),
        session: scalar(doc, "session"),
        course_subject: scalar(doc, "course_subject"),
        course_num: scalar(doc, "course_num"),
        section: scalar(doc, "section"),
        title: scalar(doc, "title"),
        location: scalar(doc, "location"),
        min_units: scalar(doc, "min_units"),
        max_units: scalar(doc, "max_units"),
        enrollment_cap: scalar(doc, "enrollment_cap"),
        waitlist_cap: scalar(doc, "waitlist_cap"),
    }
}

pub fn from_class(class: &Class) -> Document {
    Writer::new(class.id)
        .scalar("associated_properties", &class.associated_properties)
        .scalar("catalog_num", &class.catalog_num)
        .scalar("class_num", &class.class_num)
        .scalar("session", &class.session)
        .scalar("course_subject", &class.course_subject)
        .scalar("course_num", &class.course_num)
        .scalar("section", &class.section)
        .scalar("title", &class.title)
        .scalar("location", &class.location)
        .scalar("min_units", &class.min_units)
        .scalar("max_units", &class.max_units)
        .scalar("enrollment_cap", &class.enrollment_cap)
        .scalar("waitlist_cap", &class.waitlist_cap)
        .finish()
}

pub fn to_class_property(doc: &Document) -> ClassProperty {
    ClassProperty {
        id: document_id(doc),
        associated_class: scalar(doc, "associated_class"),
        class_status: scalar(doc, "class_status"),
        start_time: scalar(doc, "start_time"),
        end_time: scalar(doc, "end_time"),
        room: scalar(doc, "room"),
        facility_id: scalar(doc, "facility_id"),
        days: list(doc, "days"),
        start_date: scalar(doc, "start_date"),
        end_date: scalar(doc, "end_date"),
        instructor_email: scalar(doc, "instructor_email"),
        instructor_name: scalar(doc, "instructor_name"),
        total_enrolled: scalar(doc, "total_enrolled"),
        total_waitlisted: scalar(doc, "total_waitlisted"),
    }
}

pub fn from_class_property(property: &ClassProperty) -> Document {
    Writer::new(property.id)
        .scalar("associated_class", &property.associated_class)
        .scalar("class_status", &property.class_status)
        .scalar("start_time", &property.start_time)
        .scalar("end_time", &property.end_time)
        .scalar("room", &property.room)
        .scalar("facility_id", &property.facility_id)
        .list("days", &property.days)
        .scalar("start_date", &property.start_date)
        .scalar("end_date", &property.end_date)
        .scalar("instructor_email", &property.instructor_email)
        .scalar("instructor_name", &property.instructor_name)
        .scalar("total_enrolled", &property.total_enrolled)
        .scalar("total_waitlisted", &property.total_waitlisted)
        .finish()
}

pub fn to_tag(doc: &Document) -> Tag {
    Tag {
        id: document_id(doc),
        name: text(doc, "name"),
        classes: list(doc, "classes"),
    }
}

pub fn from_tag(tag: &Tag) -> Document {
    Writer::new(tag.id)
        .text("name", &tag.name)
        .list("classes", &tag.classes)
        .finish()
}

pub fn to_settings(doc: &Document) -> UserSettings {
    UserSettings {
        id: document_id(doc),
        email: text(doc, "email"),
        theme: text(doc, "theme"),
        calendar_start: text(doc, "calendar_start"),
        calendar_end: text(doc, "calendar_end"),
        hidden_days: list(doc, "hidden_days"),
    }
}

pub fn from_settings(settings: &UserSettings) -> Document {
    Writer::new(settings.id)
        .text("email", &settings.email)
        .text("theme", &settings.theme)
        .text("calendar_start", &settings.calendar_start)
        .text("calendar_end", &settings.calendar_end)
        .list("hidden_days", &settings.hidden_days)
        .finish()
}
