//! One-shot integrity check for cron or manual use.
//!
//! Prints the report as JSON and exits with status 1 when the `classes` and
//! `class_properties` collections disagree. Nothing is repaired.

use std::process::ExitCode;
use std::sync::Arc;

use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use class_scheduler::config::AppConfig;
use class_scheduler::db::{DocumentStore, SqliteStore};
use class_scheduler::services::IntegrityChecker;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "class_scheduler=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!("integrity check failed: {}", e);
            ExitCode::from(2)
        }
    }
}

/// Returns whether the collections are consistent.
async fn run() -> Result<bool, Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    let sqlite = SqliteStore::open(&config.database_url).await?;
    let store: Arc<dyn DocumentStore> = Arc::new(sqlite.clone());

    let result = IntegrityChecker::new(store).run().await;
    sqlite.close().await;

    let report = result?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(report.is_consistent())
}
