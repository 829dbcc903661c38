//! Backup and recovery configuration.
//!
//! `BackupConfig` represents the top-level `config.toml` controlling
//! chunk sizing, backup cadence, and recovery timing. All fields have
//! sensible defaults so a missing file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration for Sessionkeeper.
///
/// Loaded from `{data_dir}/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Directory the connection client materializes its session files into.
    /// Relative paths resolve against the data directory.
    #[serde(default = "default_session_dir")]
    pub session_dir: PathBuf,

    /// Maximum size of a single stored chunk, in bytes.
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: u64,

    /// Archives larger than this are stored chunked. Must exceed
    /// `max_chunk_size`.
    #[serde(default = "default_chunking_threshold")]
    pub chunking_threshold: u64,

    /// Seconds between scheduled backups.
    #[serde(default = "default_backup_interval_secs")]
    pub backup_interval_secs: u64,

    /// Seconds between health checks of the live connection.
    #[serde(default = "default_health_interval_secs")]
    pub health_interval_secs: u64,

    /// Grace delay after the client reports ready, before the first save.
    /// Lets the client finish writing its own files.
    #[serde(default = "default_ready_grace_secs")]
    pub ready_grace_secs: u64,

    /// Delay before re-initializing the client after a disconnect.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    /// Below this many entries the session directory is logged as
    /// implausibly sparse (advisory only).
    #[serde(default = "default_min_session_entries")]
    pub min_session_entries: usize,
}

fn default_session_dir() -> PathBuf {
    PathBuf::from("session")
}

fn default_max_chunk_size() -> u64 {
    10 * 1024 * 1024
}

fn default_chunking_threshold() -> u64 {
    12 * 1024 * 1024
}

fn default_backup_interval_secs() -> u64 {
    300
}

fn default_health_interval_secs() -> u64 {
    60
}

fn default_ready_grace_secs() -> u64 {
    10
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_min_session_entries() -> usize {
    2
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            session_dir: default_session_dir(),
            max_chunk_size: default_max_chunk_size(),
            chunking_threshold: default_chunking_threshold(),
            backup_interval_secs: default_backup_interval_secs(),
            health_interval_secs: default_health_interval_secs(),
            ready_grace_secs: default_ready_grace_secs(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            min_session_entries: default_min_session_entries(),
        }
    }
}

impl BackupConfig {
    pub fn backup_interval(&self) -> Duration {
        Duration::from_secs(self.backup_interval_secs)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs)
    }

    pub fn ready_grace(&self) -> Duration {
        Duration::from_secs(self.ready_grace_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}
