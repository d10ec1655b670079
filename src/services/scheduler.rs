use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::db::DocumentStore;
use crate::error::AppError;
use crate::services::integrity::{IntegrityChecker, IntegrityReport};

/// Runs the integrity checker on a fixed interval.
pub struct IntegrityScheduler {
    store: Arc<dyn DocumentStore>,
    interval: Duration,
}

impl IntegrityScheduler {
    pub fn new(store: Arc<dyn DocumentStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Loops forever; a failed run is logged and the next one still happens.
    pub async fn start(self) {
        info!("Starting integrity scheduler (interval: {:?})", self.interval);

        loop {
            tokio::time::sleep(self.interval).await;

            match self.run_check().await {
                Ok(report) => {
                    info!(
                        "Scheduled integrity check {} - classes missing property: {}, properties missing class: {}",
                        report.id,
                        report.classes_missing_property.len(),
                        report.properties_missing_class.len()
                    );
                }
                Err(e) => {
                    warn!("Scheduled integrity check failed: {:?}", e);
                }
            }
        }
    }

    async fn run_check(&self) -> Result<IntegrityReport, AppError> {
        IntegrityChecker::new(self.store.clone()).run().await
    }
}
