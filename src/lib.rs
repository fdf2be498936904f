//! Siphon - incremental log-collection connectors.
//!
//! Long-running workers that periodically pull new records from an external
//! log source and forward them, batched and tagged, to a downstream intake,
//! without re-delivering records already sent and without losing records
//! produced between polls. Delivery is at-least-once: a crash between
//! forwarding and checkpoint save can redeliver a batch.
//!
//! # Architecture
//!
//! ```text
//! Admin log API                     Blob container
//!      ↓                                 ↓
//! ┌───────────────────────┐   ┌───────────────────────┐
//! │ Pagination Strategy   │   │ Watermark Blob Scanner │
//! │  time-/offset-cursor  │   │  last-modified filter  │
//! └───────────────────────┘   └───────────────────────┘
//!      ↓ pages + new cursor              ↓ line records
//! ┌─────────────────────────────────────────────────────┐
//! │ Polling Workers (one per source/log-type)           │
//! │  - persist cursor via the Checkpoint Store          │
//! │  - tag, serialize, forward to the intake            │
//! │  - pace against the polling frequency               │
//! └─────────────────────────────────────────────────────┘
//!      ↓
//!   Intake
//! ```
//!
//! # Core types
//!
//! - [`CheckpointStore`] - persisted per-source progress markers
//! - [`Paginator`] - lazy page sequence over a cursor-paginated source
//! - [`PollingWorker`] - drives one log type to exhaustion and paces itself
//! - [`connectors::blob::BlobConnector`] - watermark-based container scanner
//! - [`ConnectorManager`] - spawns and stops the whole worker set

pub mod checkpoint;
pub mod config;
pub mod connectors;
pub mod intake;
pub mod manager;
pub mod pagination;
pub mod source;
pub mod worker;

pub use checkpoint::{CheckpointStore, CursorCheckpoint, WatermarkCheckpoint};
pub use config::SiphonConfig;
pub use intake::{EventForwarder, IntakeClient};
pub use manager::ConnectorManager;
pub use pagination::{build_paginator, Page, Paginator};
pub use source::{AdminLogSource, LogType};
pub use worker::{PollingWorker, StopHandle, WorkerStatus};
