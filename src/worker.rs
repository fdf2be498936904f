//! Per-log-type polling worker.
//!
//! One worker owns exactly one log type and runs until stopped. Each pass
//! loads the checkpoint, resolves the pagination strategy, and drains it;
//! every page is tagged, serialized, forwarded to the intake, and paced
//! against the configured polling frequency. Any fetch or forward error is
//! fatal for this worker only — the supervisor decides about restarts.

use crate::checkpoint::CheckpointStore;
use crate::intake::EventForwarder;
use crate::pagination::build_paginator;
use crate::source::{AdminLogSource, LogType};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};

/// Cooperative stop signal for a worker.
///
/// Advisory and polled: the worker checks it only between passes, so the
/// worst-case stop latency is one page cycle plus one pacing sleep.
#[derive(Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Status information for one worker.
#[derive(Clone, Debug, Default)]
pub struct WorkerStatus {
    /// Completion time of the last successful pass
    pub last_pass: Option<DateTime<Utc>>,
    /// Total number of completed passes
    pub pass_count: u64,
    /// Total number of events forwarded to the intake
    pub forwarded_events: u64,
    /// Last error message (set when the worker died)
    pub last_error: Option<String>,
    /// Total number of fatal errors (0 or 1 for a single worker lifetime)
    pub error_count: u64,
}

/// Pause left in the current polling slot, if any.
///
/// Keeps load on the source bounded to roughly one fetch per `frequency`
/// even under fast pagination.
pub fn remaining_pause(frequency: Duration, elapsed: Duration) -> Option<Duration> {
    frequency.checked_sub(elapsed).filter(|d| !d.is_zero())
}

/// Polling worker for one admin-API log type.
pub struct PollingWorker {
    log_type: LogType,
    source: Arc<dyn AdminLogSource>,
    forwarder: Arc<dyn EventForwarder>,
    checkpoints: Arc<CheckpointStore>,
    frequency: Duration,
    chunk_size: usize,
    stop: StopHandle,
    status: Arc<tokio::sync::Mutex<WorkerStatus>>,
}

impl PollingWorker {
    pub fn new(
        log_type: LogType,
        source: Arc<dyn AdminLogSource>,
        forwarder: Arc<dyn EventForwarder>,
        checkpoints: Arc<CheckpointStore>,
        frequency: Duration,
        chunk_size: usize,
    ) -> Self {
        Self {
            log_type,
            source,
            forwarder,
            checkpoints,
            frequency,
            chunk_size,
            stop: StopHandle::new(),
            status: Arc::new(tokio::sync::Mutex::new(WorkerStatus::default())),
        }
    }

    /// The log type this worker is statically bound to.
    pub fn log_type(&self) -> LogType {
        self.log_type
    }

    /// Returns the stop signal for this worker.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Returns a clone of the status tracker for external monitoring.
    pub fn status(&self) -> Arc<tokio::sync::Mutex<WorkerStatus>> {
        Arc::clone(&self.status)
    }

    /// Starts the polling loop (non-blocking).
    ///
    /// Spawns a background task that runs passes until the stop handle is
    /// flipped or a pass fails.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                log_type = %self.log_type,
                frequency_secs = self.frequency.as_secs(),
                chunk_size = self.chunk_size,
                "Starting polling worker"
            );

            loop {
                // Stop is only honored between passes
                if self.stop.is_stopped() {
                    info!(log_type = %self.log_type, "Stop requested, worker exiting");
                    break;
                }

                match self.fetch_batches().await {
                    Ok(forwarded) => {
                        let mut status = self.status.lock().await;
                        status.last_pass = Some(Utc::now());
                        status.pass_count += 1;
                        status.forwarded_events += forwarded as u64;
                    }
                    Err(e) => {
                        error!(
                            log_type = %self.log_type,
                            error = %e,
                            "Failed to forward events, worker exiting"
                        );
                        let mut status = self.status.lock().await;
                        status.last_error = Some(e.to_string());
                        status.error_count += 1;
                        break;
                    }
                }
            }
        })
    }

    /// Runs one full pass: drain the pagination sequence, forwarding and
    /// pacing page by page. Returns the number of events forwarded.
    async fn fetch_batches(&self) -> Result<usize> {
        let source_key = self.log_type.as_str();
        let checkpoint = self.checkpoints.load_cursor(source_key)?;
        let mut paginator = build_paginator(
            self.log_type,
            Arc::clone(&self.source),
            &checkpoint,
            self.chunk_size,
        );

        let mut total = 0usize;

        while let Some(page) = paginator.next_page().await? {
            let started = Instant::now();

            // Cursor advancement is recorded at fetch time, before the
            // forward call: at-least-once, with a possible gap if the
            // forward below fails and the worker is restarted.
            if let Some(new_cursor) = &page.checkpoint {
                self.checkpoints.save_cursor(source_key, new_cursor)?;
            }

            let batch = serialize_tagged(self.log_type, page.events)?;
            let count = batch.len();

            if !batch.is_empty() {
                self.forwarder.push_events(batch).await?;
            }
            total += count;

            let elapsed = started.elapsed();
            info!(
                log_type = %self.log_type,
                events = count,
                elapsed_secs = elapsed.as_secs(),
                "Fetched and forwarded events"
            );

            if let Some(pause) = remaining_pause(self.frequency, elapsed) {
                debug!(
                    log_type = %self.log_type,
                    pause_secs = pause.as_secs(),
                    "Next batch in the future, pacing"
                );
                sleep(pause).await;
            }
        }

        if total == 0 {
            info!(
                log_type = %self.log_type,
                wait_secs = self.frequency.as_secs(),
                "No new events, idling"
            );
            sleep(self.frequency).await;
        }

        Ok(total)
    }
}

/// Tags each record with its log type and serializes it for the intake.
fn serialize_tagged(log_type: LogType, events: Vec<Value>) -> Result<Vec<String>> {
    events
        .into_iter()
        .map(|mut event| {
            if let Some(map) = event.as_object_mut() {
                map.insert(
                    "eventtype".to_string(),
                    Value::String(log_type.as_str().to_string()),
                );
            }
            serde_json::to_string(&event).context("Failed to serialize event")
        })
        .collect()
}
