//! Connector configuration.
//!
//! Loaded from a TOML file at startup. Only the intake section is
//! mandatory; each connector family is enabled by the presence of its
//! section.

use crate::source::LogType;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration.
///
/// # Example
/// ```toml
/// [intake]
/// url = "https://intake.example.com"
/// intake_key = "ik-0123"
///
/// [admin_api]
/// hostname = "api-xxx.example.com"
/// integration_key = "DI..."
/// secret_key = "..."
/// frequency = 60
/// chunk_size = 1000
///
/// [blob]
/// path = "/var/spool/siphon/blobs"
/// ```
#[derive(Clone, Debug, Deserialize)]
pub struct SiphonConfig {
    pub intake: IntakeConfig,
    #[serde(default)]
    pub checkpoints: CheckpointConfig,
    #[serde(default)]
    pub admin_api: Option<AdminApiConfig>,
    #[serde(default)]
    pub blob: Option<BlobConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct IntakeConfig {
    /// Intake base URL
    pub url: String,
    /// Key identifying this connector instance to the intake
    pub intake_key: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CheckpointConfig {
    /// Path of the SQLite checkpoint database
    #[serde(default = "default_checkpoint_path")]
    pub path: PathBuf,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            path: default_checkpoint_path(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AdminApiConfig {
    /// API hostname (e.g. "api-xxx.example.com")
    pub hostname: String,
    pub integration_key: String,
    pub secret_key: String,
    /// Polling frequency in seconds
    #[serde(default = "default_frequency")]
    pub frequency: u64,
    /// Maximum records per page
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Log types to collect (defaults to all)
    #[serde(default = "default_log_types")]
    pub log_types: Vec<LogType>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct BlobConfig {
    /// Directory watched for uploaded blobs
    pub path: PathBuf,
    /// Polling frequency in seconds
    #[serde(default = "default_frequency")]
    pub frequency: u64,
    /// Blobs at or above this size (bytes) are handed over as spill files
    /// instead of in-memory buffers
    #[serde(default = "default_spill_threshold")]
    pub spill_threshold: u64,
}

fn default_checkpoint_path() -> PathBuf {
    PathBuf::from("checkpoints.db")
}

fn default_frequency() -> u64 {
    60
}

fn default_chunk_size() -> usize {
    1000
}

fn default_log_types() -> Vec<LogType> {
    LogType::ALL.to_vec()
}

fn default_spill_threshold() -> u64 {
    4 * 1024 * 1024
}

impl SiphonConfig {
    /// Loads and parses the configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config: SiphonConfig = toml::from_str(
            r#"
            [intake]
            url = "https://intake.example.com"
            intake_key = "ik-0123"

            [checkpoints]
            path = "/var/lib/siphon/checkpoints.db"

            [admin_api]
            hostname = "api-xxx.example.com"
            integration_key = "DIABCDEF"
            secret_key = "s3cret"
            frequency = 30
            chunk_size = 500
            log_types = ["administration", "authentication"]

            [blob]
            path = "/var/spool/siphon/blobs"
            frequency = 120
            "#,
        )
        .unwrap();

        assert_eq!(config.intake.intake_key, "ik-0123");
        assert_eq!(
            config.checkpoints.path,
            PathBuf::from("/var/lib/siphon/checkpoints.db")
        );

        let admin = config.admin_api.unwrap();
        assert_eq!(admin.frequency, 30);
        assert_eq!(admin.chunk_size, 500);
        assert_eq!(
            admin.log_types,
            vec![LogType::Administration, LogType::Authentication]
        );

        let blob = config.blob.unwrap();
        assert_eq!(blob.frequency, 120);
        assert_eq!(blob.spill_threshold, 4 * 1024 * 1024);
    }

    #[test]
    fn test_defaults() {
        let config: SiphonConfig = toml::from_str(
            r#"
            [intake]
            url = "https://intake.example.com"
            intake_key = "ik-0123"

            [admin_api]
            hostname = "api-xxx.example.com"
            integration_key = "DIABCDEF"
            secret_key = "s3cret"
            "#,
        )
        .unwrap();

        assert_eq!(config.checkpoints.path, PathBuf::from("checkpoints.db"));
        assert!(config.blob.is_none());

        let admin = config.admin_api.unwrap();
        assert_eq!(admin.frequency, 60);
        assert_eq!(admin.chunk_size, 1000);
        assert_eq!(admin.log_types.len(), 4);
    }

    #[test]
    fn test_missing_intake_is_error() {
        let result: std::result::Result<SiphonConfig, _> = toml::from_str(
            r#"
            [blob]
            path = "/tmp/blobs"
            "#,
        );
        assert!(result.is_err());
    }
}
