//! # Display Sync
//!
//! Keeps a display's local content in step with its CMS.
//!
//! ## Overview
//!
//! The [`ContentSyncCoordinator`] runs a polling loop on a background thread.
//! Each pass registers the display, downloads whatever the manifest says is
//! missing or stale, resolves the schedule to a single layout and publishes
//! it as a [`SyncEvent`]. Playback statistics queued by the player are
//! submitted on the way out.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use display_sync::{ContentSyncCoordinator, SyncConfig, SyncEvent};
//! use xmds_api::{DisplayIdentity, RegisterDisplayRequest, XmdsClient};
//!
//! let identity = DisplayIdentity::detect("server-key")?;
//! let client = Arc::new(XmdsClient::new("http://cms.example.com", identity));
//!
//! let mut sync = ContentSyncCoordinator::new(client, SyncConfig::default(), RegisterDisplayRequest::default())?;
//! let events = sync.subscribe();
//! let handle = sync.start();
//!
//! for event in events.iter() {
//!     if let SyncEvent::LayoutSelected { selection, .. } = event {
//!         println!("now showing layout {}", selection.layout_id);
//!     }
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`cache`]: save-directory layout, digests, snapshots, atomic downloads
//! - [`resolver`]: pure schedule resolution
//! - [`coordinator`]: the polling state machine and its control handle
//! - [`stats`]: proof-of-play queue with confirm-then-clear semantics
//! - [`shutdown`]: stop/wake signalling shared by every long-lived loop

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod resolver;
pub mod shutdown;
pub mod stats;

#[cfg(test)]
mod test_support;

pub use cache::{ContentCache, PartialDownload, SnapshotKind};
pub use config::SyncConfig;
pub use coordinator::{ContentSyncCoordinator, CoordinatorHandle, CycleReport, SyncState};
pub use error::{Result, SyncError};
pub use events::{SelectionTicket, SyncEvent};
pub use resolver::{resolve, LayoutSelection, TimeFormat};
pub use shutdown::{StopSignal, WaitOutcome};
pub use stats::{PlaybackStat, StatsQueue};
