use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BIND_ADDR is not a socket address: {0}")]
    BindAddr(String),

    #[error("INTEGRITY_CHECK_INTERVAL_SECS must be a positive integer: {0}")]
    Interval(String),
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub auth_session_url: String,
    /// Development-only: accept every request as this email.
    pub auth_dev_email: Option<String>,
    /// `None` disables the background integrity check.
    pub integrity_interval: Option<Duration>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL")
            .unwrap_or_else(|| "sqlite://class_scheduler.db".to_string());

        let bind_raw = lookup("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:3000".to_string());
        let bind_addr = bind_raw
            .parse()
            .map_err(|_| ConfigError::BindAddr(bind_raw.clone()))?;

        let auth_session_url = lookup("AUTH_SESSION_URL")
            .unwrap_or_else(|| "http://127.0.0.1:3001/api/auth/session".to_string());

        let auth_dev_email = lookup("AUTH_DEV_EMAIL").filter(|email| !email.is_empty());

        let integrity_interval = match lookup("INTEGRITY_CHECK_INTERVAL_SECS") {
            None => None,
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
                _ => return Err(ConfigError::Interval(raw)),
            },
        };

        Ok(Self {
            database_url,
            bind_addr,
            auth_session_url,
            auth_dev_email,
            integrity_interval,
        })
    }
}
