use serde::Serialize;

use crate::ids::ObjectId;
use crate::models::{ClassProperty, Scalar};

/// Catalog facts for one class offering. Created on import, rarely edited.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Class {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub associated_properties: Scalar,
    pub catalog_num: Scalar,
    pub class_num: Scalar,
    pub session: Scalar,
    pub course_subject: Scalar,
    pub course_num: Scalar,
    pub section: Scalar,
    pub title: Scalar,
    pub location: Scalar,
    pub min_units: Scalar,
    pub max_units: Scalar,
    pub enrollment_cap: Scalar,
    pub waitlist_cap: Scalar,
}

/// A class joined with its scheduling record by shared id.
#[derive(Debug, Clone, Serialize)]
pub struct CombinedClass {
    pub class: Class,
    pub properties: Option<ClassProperty>,
}
