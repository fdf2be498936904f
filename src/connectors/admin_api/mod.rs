//! Admin-API connector: one polling worker per configured log type.
//!
//! The API client is constructed once at assembly time and shared by every
//! worker, so a bad configuration fails at startup instead of on the first
//! poll.

pub mod client;

pub use client::AdminApiClient;

use crate::checkpoint::CheckpointStore;
use crate::config::AdminApiConfig;
use crate::intake::EventForwarder;
use crate::source::{AdminLogSource, LogType};
use crate::worker::PollingWorker;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Assembles polling workers over a shared admin-API source.
pub struct AdminApiConnector {
    source: Arc<dyn AdminLogSource>,
    forwarder: Arc<dyn EventForwarder>,
    checkpoints: Arc<CheckpointStore>,
    frequency: Duration,
    chunk_size: usize,
    log_types: Vec<LogType>,
}

impl AdminApiConnector {
    /// Builds the connector from configuration, constructing the HTTP
    /// client eagerly.
    pub fn from_config(
        config: &AdminApiConfig,
        forwarder: Arc<dyn EventForwarder>,
        checkpoints: Arc<CheckpointStore>,
    ) -> Result<Self> {
        let client = AdminApiClient::new(
            &config.hostname,
            config.integration_key.clone(),
            config.secret_key.clone(),
        )?;

        Ok(Self::with_source(
            Arc::new(client),
            forwarder,
            checkpoints,
            Duration::from_secs(config.frequency),
            config.chunk_size,
            config.log_types.clone(),
        ))
    }

    /// Builds the connector over an arbitrary source (used by tests).
    pub fn with_source(
        source: Arc<dyn AdminLogSource>,
        forwarder: Arc<dyn EventForwarder>,
        checkpoints: Arc<CheckpointStore>,
        frequency: Duration,
        chunk_size: usize,
        log_types: Vec<LogType>,
    ) -> Self {
        Self {
            source,
            forwarder,
            checkpoints,
            frequency,
            chunk_size,
            log_types,
        }
    }

    /// Creates one worker per configured log type. Each worker is statically
    /// bound to its log type for its whole lifetime; the caller starts them.
    pub fn build_workers(&self) -> Vec<PollingWorker> {
        self.log_types
            .iter()
            .map(|log_type| {
                info!(log_type = %log_type, "Building polling worker");
                PollingWorker::new(
                    *log_type,
                    Arc::clone(&self.source),
                    Arc::clone(&self.forwarder),
                    Arc::clone(&self.checkpoints),
                    self.frequency,
                    self.chunk_size,
                )
            })
            .collect()
    }
}
