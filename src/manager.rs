//! Connector manager - orchestrates worker lifecycle.
//!
//! Builds the checkpoint store and intake client, assembles the configured
//! connectors, and starts one task per source/log-type pair. Workers are
//! independent: one dying does not affect the others, and the manager does
//! not restart them — that decision belongs to the operator.

use crate::checkpoint::CheckpointStore;
use crate::config::SiphonConfig;
use crate::connectors::admin_api::AdminApiConnector;
use crate::connectors::blob::BlobConnector;
use crate::intake::{EventForwarder, IntakeClient};
use crate::worker::{StopHandle, WorkerStatus};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Supervises every worker spawned from one configuration.
pub struct ConnectorManager {
    config: SiphonConfig,
    handles: Vec<JoinHandle<()>>,
    stops: Vec<StopHandle>,
    /// Status tracking per worker key (log type, or "blob")
    status_map: HashMap<String, Arc<tokio::sync::Mutex<WorkerStatus>>>,
}

impl ConnectorManager {
    pub fn new(config: SiphonConfig) -> Self {
        Self {
            config,
            handles: Vec::new(),
            stops: Vec::new(),
            status_map: HashMap::new(),
        }
    }

    /// Starts every configured worker. Returns the number started.
    pub async fn start(&mut self) -> Result<usize> {
        let checkpoints = Arc::new(
            CheckpointStore::open(&self.config.checkpoints.path)
                .context("Failed to initialize checkpoint store")?,
        );
        info!(
            path = %self.config.checkpoints.path.display(),
            "Checkpoint store initialized"
        );

        let forwarder: Arc<dyn EventForwarder> = Arc::new(IntakeClient::new(
            self.config.intake.url.clone(),
            self.config.intake.intake_key.clone(),
        ));

        let mut started = 0;

        if let Some(admin_config) = &self.config.admin_api {
            let connector = AdminApiConnector::from_config(
                admin_config,
                Arc::clone(&forwarder),
                Arc::clone(&checkpoints),
            )
            .context("Failed to build admin-API connector")?;

            for worker in connector.build_workers() {
                let key = worker.log_type().to_string();
                self.stops.push(worker.stop_handle());
                self.status_map.insert(key, worker.status());
                self.handles.push(worker.start());
                started += 1;
            }
        }

        if let Some(blob_config) = &self.config.blob {
            let connector = BlobConnector::from_config(
                blob_config,
                Arc::clone(&forwarder),
                Arc::clone(&checkpoints),
            );
            self.stops.push(connector.stop_handle());
            self.status_map
                .insert("blob".to_string(), connector.status());
            self.handles.push(connector.start());
            started += 1;
        }

        if started == 0 {
            warn!("No connectors configured, nothing to start");
        } else {
            info!(workers = started, "Connector manager started");
        }

        Ok(started)
    }

    /// Status trackers for all running workers, keyed by source.
    pub fn status_map(&self) -> &HashMap<String, Arc<tokio::sync::Mutex<WorkerStatus>>> {
        &self.status_map
    }

    /// Signals every worker to stop and waits for them to exit.
    ///
    /// Cancellation is cooperative: a worker mid-page or mid-sleep finishes
    /// that step first, so shutdown can take up to one page cycle plus one
    /// pacing sleep.
    pub async fn shutdown(self) {
        info!(workers = self.handles.len(), "Shutting down connector manager");

        for stop in &self.stops {
            stop.stop();
        }

        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Worker task did not shut down cleanly");
            }
        }

        info!("Connector manager stopped");
    }
}
