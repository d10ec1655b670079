use serde::Serialize;

use crate::ids::ObjectId;

/// Per-user calendar preferences, keyed by the signed-in email.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserSettings {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub email: String,
    pub theme: String,
    pub calendar_start: String,
    pub calendar_end: String,
    pub hidden_days: Vec<String>,
}

impl UserSettings {
    pub fn defaults_for(email: &str) -> Self {
        Self {
            email: email.to_string(),
            theme: "light".to_string(),
            calendar_start: "07:00".to_string(),
            calendar_end: "22:00".to_string(),
            ..Self::default()
        }
    }
}
