//! # Display Player
//!
//! Plays cached layouts on screen.
//!
//! ## Overview
//!
//! The [`PlaybackSequencer`] consumes [`display_sync::SyncEvent`]s and keeps
//! exactly one layout running. Every region of that layout is driven by its
//! own [`RegionExecutor`] thread, which walks the region's media list one
//! [`MediaUnit`] at a time. Images and web pages are handed to a
//! [`Renderer`]; videos run in an external player started through a
//! [`ProcessLauncher`].
//!
//! ```text
//! SyncEvent → PlaybackSequencer → RegionExecutor (per region) → MediaUnit
//!                                                      ↓
//!                                      Renderer / ProcessLauncher / StatsQueue
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use display_player::{HeadlessRenderer, MplayerLauncher, PlaybackSequencer, PlayerConfig};
//!
//! let sequencer = PlaybackSequencer::new(
//!     PlayerConfig::default(),
//!     Arc::new(HeadlessRenderer::new()),
//!     Arc::new(MplayerLauncher::default()),
//!     coordinator.stats_queue(),
//! );
//! let handle = sequencer.start(coordinator.subscribe());
//! ```

pub mod active;
pub mod config;
pub mod error;
pub mod events;
pub mod layout;
pub mod media;
pub mod process;
pub mod region;
pub mod render;
pub mod sequencer;

#[cfg(test)]
mod test_support;

pub use active::{ActiveMedia, MediaKey};
pub use config::PlayerConfig;
pub use error::{PlayerError, Result};
pub use events::{EventBus, MediaInfo, PlaybackEvent};
pub use layout::{Geometry, Layout, MediaKind, MediaSpec, Region};
pub use media::{MediaContext, MediaState, MediaUnit};
pub use process::{
    parse_status_line, MplayerLauncher, PlayerArgs, PlayerProcess, ProcessLauncher, StatusLine,
};
pub use region::{RegionExecutor, RegionHandle};
pub use render::{HeadlessRenderer, Renderer, ShowRequest, ViewContent, ViewId};
pub use sequencer::{PlaybackHandle, PlaybackSequencer};
