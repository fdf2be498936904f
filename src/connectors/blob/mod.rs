//! Freshness-watermark blob connector.
//!
//! The blob container has no native pagination, so a last-modified
//! watermark stands in for a cursor: each pass enumerates the container,
//! keeps blobs strictly newer than the watermark, downloads and splits them
//! into line records, and then advances the watermark to the newest
//! processed blob — never to "now", so a lull in uploads cannot
//! fast-forward past blobs that appear late with older timestamps.

pub mod storage;

pub use storage::{BlobEntry, BlobStorage, DownloadedBlob, FsBlobStore};

use crate::checkpoint::{default_lower_bound, CheckpointStore, WatermarkCheckpoint};
use crate::config::BlobConfig;
use crate::intake::EventForwarder;
use crate::worker::{remaining_pause, StopHandle, WorkerStatus};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use std::io::Read;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};

const SOURCE_KEY: &str = "blob";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Blob-scanning worker with the same pacing, stop, and fatal-error
/// contract as the admin-API polling workers.
pub struct BlobConnector {
    storage: Arc<dyn BlobStorage>,
    forwarder: Arc<dyn EventForwarder>,
    checkpoints: Arc<CheckpointStore>,
    frequency: Duration,
    stop: StopHandle,
    status: Arc<tokio::sync::Mutex<WorkerStatus>>,
}

impl BlobConnector {
    pub fn new(
        storage: Arc<dyn BlobStorage>,
        forwarder: Arc<dyn EventForwarder>,
        checkpoints: Arc<CheckpointStore>,
        frequency: Duration,
    ) -> Self {
        Self {
            storage,
            forwarder,
            checkpoints,
            frequency,
            stop: StopHandle::new(),
            status: Arc::new(tokio::sync::Mutex::new(WorkerStatus::default())),
        }
    }

    /// Builds the connector over a directory-backed store.
    pub fn from_config(
        config: &BlobConfig,
        forwarder: Arc<dyn EventForwarder>,
        checkpoints: Arc<CheckpointStore>,
    ) -> Self {
        let storage = FsBlobStore::new(config.path.clone(), config.spill_threshold);
        Self::new(
            Arc::new(storage),
            forwarder,
            checkpoints,
            Duration::from_secs(config.frequency),
        )
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn status(&self) -> Arc<tokio::sync::Mutex<WorkerStatus>> {
        Arc::clone(&self.status)
    }

    /// Effective watermark: the persisted value, clamped to at most one
    /// hour in the past. A missing or stale checkpoint yields a one-hour
    /// backward window, never more.
    pub fn last_event_date(&self) -> Result<DateTime<Utc>> {
        let floor = default_lower_bound();
        let saved = self
            .checkpoints
            .load_watermark(SOURCE_KEY)?
            .last_event_date;
        Ok(match saved {
            Some(date) if date > floor => date,
            _ => floor,
        })
    }

    /// Enumerates the container and keeps blobs modified strictly after
    /// `lower_bound` (a blob exactly at the watermark was already
    /// processed), preserving the source's enumeration order.
    pub async fn get_most_recent_blobs(
        &self,
        lower_bound: DateTime<Utc>,
    ) -> Result<Vec<BlobEntry>> {
        let blobs = self.storage.list_blobs().await?;
        Ok(blobs
            .into_iter()
            .filter(|blob| blob.last_modified > lower_bound)
            .collect())
    }

    /// One full scan: download every qualifying blob, decompress and split
    /// it into non-empty line records, then advance the watermark to the
    /// newest processed blob.
    pub async fn collect_records(&self) -> Result<Vec<String>> {
        let lower_bound = self.last_event_date()?;
        let blobs = self.get_most_recent_blobs(lower_bound).await?;

        let mut records = Vec::new();
        let mut newest: Option<DateTime<Utc>> = None;

        for blob in blobs {
            debug!(blob = %blob.name, last_modified = %blob.last_modified, "Processing blob");

            let raw = self.storage.download_blob(&blob.name).await?.into_bytes()?;
            let data = maybe_decompress(raw)
                .with_context(|| format!("Failed to decompress blob '{}'", blob.name))?;
            let text = String::from_utf8(data)
                .with_context(|| format!("Blob '{}' is not valid UTF-8", blob.name))?;

            records.extend(
                text.lines()
                    .filter(|line| !line.is_empty())
                    .map(str::to_owned),
            );

            newest = Some(match newest {
                Some(current) => current.max(blob.last_modified),
                None => blob.last_modified,
            });
        }

        if let Some(last_event_date) = newest {
            self.checkpoints.save_watermark(
                SOURCE_KEY,
                &WatermarkCheckpoint {
                    last_event_date: Some(last_event_date),
                },
            )?;
        }

        Ok(records)
    }

    /// Starts the scanning loop (non-blocking).
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                frequency_secs = self.frequency.as_secs(),
                "Starting blob worker"
            );

            loop {
                if self.stop.is_stopped() {
                    info!("Stop requested, blob worker exiting");
                    break;
                }

                match self.forward_pass().await {
                    Ok(forwarded) => {
                        let mut status = self.status.lock().await;
                        status.last_pass = Some(Utc::now());
                        status.pass_count += 1;
                        status.forwarded_events += forwarded as u64;
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to forward blob records, worker exiting");
                        let mut status = self.status.lock().await;
                        status.last_error = Some(e.to_string());
                        status.error_count += 1;
                        break;
                    }
                }
            }
        })
    }

    async fn forward_pass(&self) -> Result<usize> {
        let started = Instant::now();

        let records = self.collect_records().await?;
        let count = records.len();

        if count > 0 {
            self.forwarder.push_events(records).await?;
        }

        let elapsed = started.elapsed();
        info!(
            events = count,
            elapsed_secs = elapsed.as_secs(),
            "Fetched and forwarded blob records"
        );

        if count == 0 {
            info!(
                wait_secs = self.frequency.as_secs(),
                "No new blobs, idling"
            );
            sleep(self.frequency).await;
        } else if let Some(pause) = remaining_pause(self.frequency, elapsed) {
            debug!(pause_secs = pause.as_secs(), "Next scan in the future, pacing");
            sleep(pause).await;
        }

        Ok(count)
    }
}

/// Transparently inflates gzip payloads, detected by content signature
/// rather than blob name.
fn maybe_decompress(raw: Vec<u8>) -> Result<Vec<u8>> {
    if !raw.starts_with(&GZIP_MAGIC) {
        return Ok(raw);
    }
    let mut decoder = GzDecoder::new(raw.as_slice());
    let mut inflated = Vec::new();
    decoder
        .read_to_end(&mut inflated)
        .context("Invalid gzip stream")?;
    Ok(inflated)
}
