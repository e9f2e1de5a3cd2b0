//! Display configuration file
//!
//! A flat JSON document with camelCase keys. Missing keys take their
//! defaults, and a missing or unreadable file yields the full default set, so
//! a display can always start.

use std::fs;
use std::path::{Path, PathBuf};

use display_player::PlayerConfig;
use display_sync::{SyncConfig, TimeFormat};
use serde::{Deserialize, Serialize};

use crate::error::{DisplayError, Result};

/// File name used under the platform config directory
pub const CONFIG_FILE_NAME: &str = "xibo-display.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisplayConfig {
    /// Directory holding cached content and snapshots
    pub save_dir: PathBuf,
    /// CMS base URL
    pub url: String,
    pub server_key: String,
    /// strftime pattern of CMS timestamps
    pub str_time_fmt: String,
    /// Seconds the CMS clock is ahead of UTC
    pub cms_tz_offset: i64,
    #[serde(alias = "res_file_ext")]
    pub res_file_ext: String,
    #[serde(alias = "layout_file_ext")]
    pub layout_file_ext: String,
    /// Name reported on registration
    pub display_name: String,
    /// Push publisher, e.g. `tcp://cms:9505`; push is off when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xmr_pub_url: Option<String>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            save_dir: PathBuf::from(display_sync::config::DEFAULT_SAVE_DIR),
            url: "http://localhost:8000".to_string(),
            server_key: "asdf".to_string(),
            str_time_fmt: display_sync::resolver::DEFAULT_TIME_FORMAT.to_string(),
            cms_tz_offset: display_sync::resolver::DEFAULT_TZ_OFFSET,
            res_file_ext: ".html".to_string(),
            layout_file_ext: ".xml".to_string(),
            display_name: "xiboside".to_string(),
            xmr_pub_url: None,
        }
    }
}

impl DisplayConfig {
    /// Default location: `{config_dir}/xibo-display.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
    }

    /// Load from `path`, falling back to defaults on any problem
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), "Using default configuration: {}", e);
                Self::default()
            }
        }
    }

    /// Load from `path`, reporting why it could not be used
    pub fn try_load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| DisplayError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Write pretty JSON to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| DisplayError::Config(format!("failed to serialize config: {}", e)))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, text)?;
        Ok(())
    }

    pub fn time_format(&self) -> TimeFormat {
        TimeFormat::new(self.str_time_fmt.clone(), self.cms_tz_offset)
    }

    pub fn push_enabled(&self) -> bool {
        self.xmr_pub_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }

    /// Sync tunables derived from this file
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            save_dir: self.save_dir.clone(),
            resource_ext: self.res_file_ext.clone(),
            layout_ext: self.layout_file_ext.clone(),
            time_format: self.time_format(),
            ..SyncConfig::default()
        }
    }

    /// Playback tunables derived from this file
    pub fn player_config(&self) -> PlayerConfig {
        PlayerConfig {
            save_dir: self.save_dir.clone(),
            resource_ext: self.res_file_ext.clone(),
            layout_ext: self.layout_file_ext.clone(),
            ..PlayerConfig::default()
        }
    }
}
