//! Blob storage collaborator interface.
//!
//! The scanner in the parent module only needs listing metadata and a
//! download call; everything transport-specific (cloud SDK, auth, retries)
//! stays behind this trait. `FsBlobStore` is the directory-backed
//! implementation used for local drop folders and tests.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::PathBuf;

/// Listing metadata for one blob. Used only for filtering and ordering,
/// never mutated.
#[derive(Clone, Debug, PartialEq)]
pub struct BlobEntry {
    pub name: String,
    pub last_modified: DateTime<Utc>,
}

/// Result of a blob download: exactly one of `file_path` (large-blob spill
/// path) or `content` (in-memory bytes) is populated per call.
#[derive(Clone, Debug, Default)]
pub struct DownloadedBlob {
    pub file_path: Option<PathBuf>,
    pub content: Option<Vec<u8>>,
}

impl DownloadedBlob {
    pub fn in_memory(content: Vec<u8>) -> Self {
        Self {
            file_path: None,
            content: Some(content),
        }
    }

    pub fn spilled(file_path: PathBuf) -> Self {
        Self {
            file_path: Some(file_path),
            content: None,
        }
    }

    /// Materializes the payload, reading the spill file when needed.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match (self.file_path, self.content) {
            (Some(path), None) => fs::read(&path)
                .with_context(|| format!("Failed to read spill file {}", path.display())),
            (None, Some(content)) => Ok(content),
            _ => bail!("Blob download must populate exactly one of file path or content"),
        }
    }
}

/// Enumeration and retrieval of blobs in one container.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Lists every blob in the container with its last-modified timestamp.
    async fn list_blobs(&self) -> Result<Vec<BlobEntry>>;

    /// Downloads one blob by name.
    async fn download_blob(&self, name: &str) -> Result<DownloadedBlob>;
}

/// Directory-backed blob store.
///
/// Blob names are file names, last-modified is the file mtime. Downloads
/// below the spill threshold are returned in memory; larger ones hand back
/// the file path instead.
pub struct FsBlobStore {
    root: PathBuf,
    spill_threshold: u64,
}

impl FsBlobStore {
    pub fn new(root: PathBuf, spill_threshold: u64) -> Self {
        Self {
            root,
            spill_threshold,
        }
    }
}

#[async_trait]
impl BlobStorage for FsBlobStore {
    async fn list_blobs(&self) -> Result<Vec<BlobEntry>> {
        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("Failed to read blob directory {}", self.root.display()))?;

        let mut blobs = Vec::new();
        for entry in entries {
            let entry = entry.context("Failed to read directory entry")?;
            let metadata = entry.metadata().context("Failed to read file metadata")?;
            if !metadata.is_file() {
                continue;
            }
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(_) => continue,
            };
            let modified = metadata
                .modified()
                .context("Failed to read file modification time")?;
            blobs.push(BlobEntry {
                name,
                last_modified: DateTime::<Utc>::from(modified),
            });
        }

        // read_dir order is platform-dependent; enumerate by name so the
        // order is stable across polls
        blobs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(blobs)
    }

    async fn download_blob(&self, name: &str) -> Result<DownloadedBlob> {
        let path = self.root.join(name);
        let metadata = fs::metadata(&path)
            .with_context(|| format!("Failed to stat blob {}", path.display()))?;

        if metadata.len() >= self.spill_threshold {
            Ok(DownloadedBlob::spilled(path))
        } else {
            let content = fs::read(&path)
                .with_context(|| format!("Failed to read blob {}", path.display()))?;
            Ok(DownloadedBlob::in_memory(content))
        }
    }
}
