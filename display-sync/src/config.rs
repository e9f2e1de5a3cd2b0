use std::path::PathBuf;
use std::time::Duration;

use crate::resolver::TimeFormat;
use crate::shutdown::STOP_GRANULARITY;

/// Default save directory
pub const DEFAULT_SAVE_DIR: &str = "/tmp/xibot";

/// GetFile chunk size
pub const DEFAULT_CHUNK_SIZE: u64 = 2 * 1024 * 1024;

/// Poll interval used until the CMS announces one
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Configuration for the content sync loop
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Directory holding cached content and snapshots
    pub save_dir: PathBuf,
    /// Extension of cached widget resources
    pub resource_ext: String,
    /// Extension of cached layout files
    pub layout_ext: String,
    /// Bytes requested per GetFile call
    pub chunk_size: u64,
    /// Poll interval before the first successful registration
    pub poll_interval: Duration,
    /// How long a layout selection may stay unacknowledged
    pub handoff_timeout: Duration,
    /// Upper bound on how long a stop request can go unnoticed
    pub stop_granularity: Duration,
    /// CMS time format and offset
    pub time_format: TimeFormat,
    /// Run one pass and exit
    pub single_shot: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            save_dir: PathBuf::from(DEFAULT_SAVE_DIR),
            resource_ext: ".html".to_string(),
            layout_ext: ".xml".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            handoff_timeout: Duration::from_secs(30),
            stop_granularity: STOP_GRANULARITY,
            time_format: TimeFormat::default(),
            single_shot: false,
        }
    }
}
