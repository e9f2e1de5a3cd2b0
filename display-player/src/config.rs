use std::path::PathBuf;
use std::time::Duration;

use display_sync::config::DEFAULT_SAVE_DIR;
use display_sync::shutdown::STOP_GRANULARITY;

/// Tunables for playback
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Directory holding cached content
    pub save_dir: PathBuf,
    pub layout_ext: String,
    pub resource_ext: String,
    /// Attempts to let a region quiesce before forcing it down
    pub teardown_tries: u32,
    /// Pause between teardown attempts
    pub teardown_interval: Duration,
    /// Attempts to close a view
    pub close_tries: u32,
    pub close_interval: Duration,
    /// How long a video player may take to report playback
    pub video_start_timeout: Duration,
    /// How long a player gets to exit after `quit`
    pub video_stop_grace: Duration,
    /// Play time of image and web media without a duration
    pub default_duration: Duration,
    /// Pause after a media unit failed to start
    pub failure_backoff: Duration,
    /// Polling slice for stop and status checks
    pub poll_interval: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            save_dir: PathBuf::from(DEFAULT_SAVE_DIR),
            layout_ext: ".xml".to_string(),
            resource_ext: ".html".to_string(),
            teardown_tries: 10,
            teardown_interval: Duration::from_millis(100),
            close_tries: 10,
            close_interval: Duration::from_millis(50),
            video_start_timeout: Duration::from_secs(3),
            video_stop_grace: Duration::from_secs(1),
            default_duration: Duration::from_secs(10),
            failure_backoff: Duration::from_secs(1),
            poll_interval: STOP_GRANULARITY,
        }
    }
}
