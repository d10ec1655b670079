use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use class_scheduler::api::router;
use class_scheduler::auth::{AuthProvider, SessionAuth, StaticAuth};
use class_scheduler::config::AppConfig;
use class_scheduler::db::{DocumentStore, SqliteStore};
use class_scheduler::services::IntegrityScheduler;
use class_scheduler::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "class_scheduler=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let sqlite = SqliteStore::open(&config.database_url).await?;
    let store: Arc<dyn DocumentStore> = Arc::new(sqlite.clone());

    let auth: Arc<dyn AuthProvider> = match &config.auth_dev_email {
        Some(email) => {
            warn!("AUTH_DEV_EMAIL is set: every request is treated as {}", email);
            Arc::new(StaticAuth::new(email.clone()))
        }
        None => Arc::new(SessionAuth::new(config.auth_session_url.clone())?),
    };

    if let Some(interval) = config.integrity_interval {
        let scheduler = IntegrityScheduler::new(store.clone(), interval);
        tokio::spawn(scheduler.start());
    }

    let state = AppState { store, auth };

    let app = router(state);

    info!("listening on http://{}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sqlite.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {}", e);
    }
    info!("shutting down");
}
