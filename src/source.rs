//! Source-side collaborator interface for the admin log API.
//!
//! The pagination strategies in [`crate::pagination`] are written against
//! this trait rather than a concrete HTTP client, so tests can substitute
//! an in-memory source and the transport (auth, retries, timeouts) stays
//! the implementation's concern.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Identifies which logical sub-source of the admin API a worker and its
/// checkpoint belong to.
///
/// The string form doubles as the checkpoint key and the `eventtype` tag
/// added to every forwarded record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogType {
    Administration,
    Authentication,
    Telephony,
    Offline,
}

impl LogType {
    /// All log types, in the order workers are started.
    pub const ALL: [LogType; 4] = [
        LogType::Administration,
        LogType::Authentication,
        LogType::Telephony,
        LogType::Offline,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogType::Administration => "administration",
            LogType::Authentication => "authentication",
            LogType::Telephony => "telephony",
            LogType::Offline => "offline",
        }
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query for one page of an offset-paginated log endpoint.
///
/// Exactly one of `next_offset` (resume from a known cursor) or `min_time`
/// (first fetch of a pass) drives the query.
#[derive(Clone, Debug)]
pub struct PageQuery {
    pub min_time: Option<i64>,
    pub next_offset: Option<String>,
    pub limit: usize,
}

impl PageQuery {
    pub fn from_offset(next_offset: String, limit: usize) -> Self {
        Self {
            min_time: None,
            next_offset: Some(next_offset),
            limit,
        }
    }

    pub fn from_min_time(min_time: Option<i64>, limit: usize) -> Self {
        Self {
            min_time,
            next_offset: None,
            limit,
        }
    }
}

/// One page of records from an offset-paginated endpoint, plus the cursor
/// for the following page when the source provided one.
#[derive(Clone, Debug)]
pub struct PageResponse {
    pub items: Vec<Value>,
    pub next_offset: Option<String>,
}

/// Read access to the admin log API.
///
/// `fetch_since` serves the log types with no native pagination (the source
/// only understands "everything since T"); `fetch_page` serves the log
/// types that return an opaque `next_offset` cursor.
#[async_trait]
pub trait AdminLogSource: Send + Sync {
    /// Fetch all records with a timestamp at or after `min_time`.
    async fn fetch_since(&self, log_type: LogType, min_time: i64) -> Result<Vec<Value>>;

    /// Fetch one page of records, sorted ascending by timestamp on the
    /// source side.
    async fn fetch_page(&self, log_type: LogType, query: PageQuery) -> Result<PageResponse>;
}
