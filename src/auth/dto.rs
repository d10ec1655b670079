use serde::Deserialize;

/// Body of the session endpoint. An empty object means "no session".
/// Only the email is read; other session fields are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct SessionResponse {
    #[serde(default)]
    pub user: Option<SessionUser>,
}

#[derive(Debug, Deserialize)]
pub struct SessionUser {
    #[serde(default)]
    pub email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_body_ignores_extra_fields() {
        let session: SessionResponse = serde_json::from_str(
            r#"{ "user": { "email": "prof@uni.edu", "name": "Prof", "image": null }, "expires": "2030-01-01" }"#,
        )
        .unwrap();
        let email = session.user.and_then(|u| u.email);
        assert_eq!(email.as_deref(), Some("prof@uni.edu"));

        let empty: SessionResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.user.is_none());
    }
}
