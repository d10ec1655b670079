use serde::Serialize;

use crate::ids::ObjectId;
use crate::models::Scalar;

/// Mutable scheduling and enrollment facts for a [`Class`](super::Class),
/// stored under the same id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassProperty {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub associated_class: Scalar,
    pub class_status: Scalar,
    pub start_time: Scalar,
    pub end_time: Scalar,
    pub room: Scalar,
    pub facility_id: Scalar,
    pub days: Vec<String>,
    pub start_date: Scalar,
    pub end_date: Scalar,
    pub instructor_email: Scalar,
    pub instructor_name: Scalar,
    pub total_enrolled: Scalar,
    pub total_waitlisted: Scalar,
}
