//! Checkpoint persistence for connector workers.
//!
//! Progress markers are stored in a SQLite key-value table, one row per
//! source key (log type or blob container). Workers operate on disjoint
//! keys but share one store instance; a single mutex serializes every
//! load/save so concurrent workers cannot interleave partial writes.
//!
//! # Schema
//! ```sql
//! CREATE TABLE checkpoints (
//!     source_key TEXT PRIMARY KEY,
//!     state TEXT NOT NULL,       -- checkpoint as JSON
//!     updated_at TEXT NOT NULL   -- ISO 8601 timestamp
//! );
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;

/// Progress marker for a cursor-paginated log type.
///
/// `min_time` tracks the time-cursor variant; `next_offset` tracks the
/// offset-cursor variant. A save replaces the whole row, so only the field
/// belonging to the active variant is ever populated.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorCheckpoint {
    pub min_time: Option<i64>,
    pub next_offset: Option<String>,
}

/// Progress marker for a watermark-enumerated blob source.
///
/// Everything with `last_modified <= last_event_date` has been processed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatermarkCheckpoint {
    pub last_event_date: Option<DateTime<Utc>>,
}

/// SQLite-backed checkpoint store.
///
/// Loading a key that was never written yields a default (all-`None`)
/// checkpoint; saving is an idempotent overwrite. Once written, a
/// checkpoint only moves forward — rollback never happens in normal
/// operation, the store simply does not second-guess its callers.
///
/// # Thread safety
/// The connection is wrapped in a `Mutex`; lock scope is one statement,
/// never a whole worker cycle, so contention across workers stays low.
pub struct CheckpointStore {
    conn: Mutex<Connection>,
}

impl CheckpointStore {
    /// Creates or opens a checkpoint store at `db_path`.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path).context("Failed to open checkpoint database")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS checkpoints (
                source_key TEXT PRIMARY KEY,
                state TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )
        .context("Failed to create checkpoints table")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Loads the cursor checkpoint for `source_key`, or a default one if
    /// none was saved yet.
    pub fn load_cursor(&self, source_key: &str) -> Result<CursorCheckpoint> {
        self.load(source_key)
    }

    /// Saves the cursor checkpoint for `source_key` (idempotent overwrite).
    pub fn save_cursor(&self, source_key: &str, checkpoint: &CursorCheckpoint) -> Result<()> {
        self.save(source_key, checkpoint)
    }

    /// Loads the watermark checkpoint for `source_key`, or a default one if
    /// none was saved yet.
    pub fn load_watermark(&self, source_key: &str) -> Result<WatermarkCheckpoint> {
        self.load(source_key)
    }

    /// Saves the watermark checkpoint for `source_key`.
    pub fn save_watermark(&self, source_key: &str, checkpoint: &WatermarkCheckpoint) -> Result<()> {
        self.save(source_key, checkpoint)
    }

    fn load<T: Default + DeserializeOwned>(&self, source_key: &str) -> Result<T> {
        let conn = self.conn.lock().unwrap();
        let state: Option<String> = conn
            .query_row(
                "SELECT state FROM checkpoints WHERE source_key = ?1",
                params![source_key],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query checkpoint")?;

        match state {
            Some(json) => serde_json::from_str(&json)
                .with_context(|| format!("Corrupt checkpoint state for '{}'", source_key)),
            None => Ok(T::default()),
        }
    }

    fn save<T: Serialize>(&self, source_key: &str, checkpoint: &T) -> Result<()> {
        let state = serde_json::to_string(checkpoint).context("Failed to encode checkpoint")?;
        let now = Utc::now().to_rfc3339();

        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO checkpoints (source_key, state, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(source_key) DO UPDATE SET state = ?2, updated_at = ?3
            "#,
            params![source_key, state, now],
        )
        .context("Failed to save checkpoint")?;

        Ok(())
    }
}

/// Default lower bound for a source with no usable checkpoint: one hour
/// before now, truncated to whole seconds. A freshly started connector gets
/// a small backward-looking window instead of missing records produced just
/// before startup.
pub fn default_lower_bound() -> DateTime<Utc> {
    (Utc::now() - chrono::Duration::hours(1)).trunc_subsecs(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_returns_default() {
        let store = CheckpointStore::open(":memory:").unwrap();

        let cursor = store.load_cursor("administration").unwrap();
        assert_eq!(cursor, CursorCheckpoint::default());
        assert!(cursor.min_time.is_none());
        assert!(cursor.next_offset.is_none());

        let watermark = store.load_watermark("blob").unwrap();
        assert!(watermark.last_event_date.is_none());
    }

    #[test]
    fn test_save_and_load_cursor() {
        let store = CheckpointStore::open(":memory:").unwrap();

        let checkpoint = CursorCheckpoint {
            min_time: Some(1_700_000_000),
            next_offset: None,
        };
        store.save_cursor("administration", &checkpoint).unwrap();
        assert_eq!(store.load_cursor("administration").unwrap(), checkpoint);

        // Overwrite replaces the whole row
        let replacement = CursorCheckpoint {
            min_time: None,
            next_offset: Some("cursor-42".to_string()),
        };
        store.save_cursor("administration", &replacement).unwrap();
        assert_eq!(store.load_cursor("administration").unwrap(), replacement);
    }

    #[test]
    fn test_keys_are_disjoint() {
        let store = CheckpointStore::open(":memory:").unwrap();

        store
            .save_cursor(
                "telephony",
                &CursorCheckpoint {
                    min_time: None,
                    next_offset: Some("t1".to_string()),
                },
            )
            .unwrap();

        assert_eq!(
            store.load_cursor("authentication").unwrap(),
            CursorCheckpoint::default()
        );
    }

    #[test]
    fn test_watermark_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("checkpoints.db");

        let saved = WatermarkCheckpoint {
            last_event_date: Some(Utc::now().trunc_subsecs(0)),
        };

        {
            let store = CheckpointStore::open(&path).unwrap();
            store.save_watermark("blob", &saved).unwrap();
        }

        let store = CheckpointStore::open(&path).unwrap();
        assert_eq!(store.load_watermark("blob").unwrap(), saved);
    }

    #[test]
    fn test_default_lower_bound_is_one_hour_ago() {
        let lower_bound = default_lower_bound();
        let expected = Utc::now() - chrono::Duration::hours(1);
        let drift = (expected - lower_bound).num_seconds().abs();
        assert!(drift <= 1, "lower bound drifted by {}s", drift);
        assert_eq!(lower_bound.timestamp_subsec_nanos(), 0);
    }
}
