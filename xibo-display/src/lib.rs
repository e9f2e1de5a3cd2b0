//! # xibo-display
//!
//! A digital signage display client for Xibo-compatible CMS servers.
//!
//! ```rust,no_run
//! use xibo_display::{logging, DisplayClient, DisplayConfig};
//!
//! fn main() -> Result<(), xibo_display::DisplayError> {
//!     logging::init_logging_from_env()?;
//!
//!     let path = DisplayConfig::default_path().unwrap_or_else(|| "xibo-display.json".into());
//!     let config = DisplayConfig::load(&path);
//!
//!     let mut display = DisplayClient::new(config)?.start()?;
//!     for event in display.subscribe_playback().iter() {
//!         println!("{:?}", event);
//!     }
//!     display.stop();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! PushChannel ──(early sync)──┐
//!                             ↓
//! ContentSyncCoordinator → ContentCache → resolve() → SyncEvent
//!        ↑                                              ↓
//!   StatsQueue ←──── MediaUnit ← RegionExecutor ← PlaybackSequencer
//! ```
//!
//! - [`display_sync`]: polling, downloads, schedule resolution
//! - [`display_player`]: layouts, regions and media playback
//! - [`push_channel`]: CMS push messages
//! - [`xmds_api`]: the typed XMDS client

pub mod client;
pub mod config;
pub mod error;
pub mod logging;

pub use client::{DisplayClient, RunningDisplay};
pub use config::DisplayConfig;
pub use error::{DisplayError, Result};
pub use logging::{init_logging, init_logging_from_env, LoggingMode};

pub use display_player;
pub use display_sync;
pub use push_channel;
pub use xmds_api;
