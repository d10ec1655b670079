pub mod dto;

use std::time::Duration;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, header};
use reqwest::{Client, StatusCode};
use tracing::{error, warn};

use crate::error::AppError;
use crate::state::AppState;

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Email of the signed-in caller, or `Unauthorized`.
    async fn require_email(&self, headers: &HeaderMap) -> Result<String, AppError>;
}

/// Asks an external session endpoint who the caller is, forwarding the
/// caller's cookie and authorization headers.
pub struct SessionAuth {
    client: Client,
    session_url: String,
}

impl SessionAuth {
    pub fn new(session_url: impl Into<String>) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                error!("failed to build http client: {}", e);
                AppError::InternalServerError
            })?;
        Ok(Self {
            client,
            session_url: session_url.into(),
        })
    }
}

#[async_trait]
impl AuthProvider for SessionAuth {
    async fn require_email(&self, headers: &HeaderMap) -> Result<String, AppError> {
        let mut request = self.client.get(&self.session_url);
        let mut has_credentials = false;
        for name in [header::COOKIE, header::AUTHORIZATION] {
            if let Some(value) = headers.get(&name).and_then(|v| v.to_str().ok()) {
                request = request.header(name.as_str(), value);
                has_credentials = true;
            }
        }
        if !has_credentials {
            return Err(AppError::Unauthorized);
        }

        let response = request.send().await.map_err(|e| {
            error!("session endpoint unreachable: {}", e);
            AppError::InternalServerError
        })?;

        let status = response.status();
        if !status.is_success() {
            if status != StatusCode::UNAUTHORIZED {
                warn!("session endpoint returned {}", status);
            }
            return Err(AppError::Unauthorized);
        }

        let session = response.json::<dto::SessionResponse>().await.map_err(|e| {
            error!("failed to parse session response: {}", e);
            AppError::InternalServerError
        })?;

        session
            .user
            .and_then(|user| user.email)
            .filter(|email| !email.is_empty())
            .ok_or(AppError::Unauthorized)
    }
}

/// Accepts every request as the configured email. Local development and tests.
pub struct StaticAuth {
    email: String,
}

impl StaticAuth {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }
}

#[async_trait]
impl AuthProvider for StaticAuth {
    async fn require_email(&self, _headers: &HeaderMap) -> Result<String, AppError> {
        Ok(self.email.clone())
    }
}

/// Extractor for handlers that need a signed-in caller.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub email: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let email = state.auth.require_email(&parts.headers).await?;
        Ok(Self { email })
    }
}
