use serde::Serialize;

use crate::ids::ObjectId;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Tag {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    /// Ids of the tagged classes.
    pub classes: Vec<String>,
}
