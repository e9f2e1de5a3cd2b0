//! High-level XMDS API for Xibo displays
//!
//! This crate provides a type-safe, trait-based API for the Xibo display
//! service. It uses the private `soap-client` crate for the SOAP transport and
//! exposes the [`RemoteService`] seam consumed by the sync loop.
//!
//! ```rust,no_run
//! use xmds_api::{DisplayIdentity, RemoteService, XmdsClient};
//!
//! let identity = DisplayIdentity::detect("server-key")?;
//! let client = XmdsClient::new("http://cms.example.com", identity);
//!
//! let manifest = client.required_files()?;
//! for file in &manifest.files {
//!     println!("{} {} ({} bytes)", file.kind, file.id, file.size);
//! }
//! # Ok::<(), xmds_api::ApiError>(())
//! ```

pub mod client;
pub mod digest;
pub mod error;
pub mod identity;
pub mod operation;
pub mod operations;
pub mod service;

pub use client::XmdsClient;
pub use error::{ApiError, Result};
pub use identity::DisplayIdentity;
pub use operation::XmdsOperation;
pub use operations::{
    EntryKind, GetFileRequest, GetResourceRequest, InventoryItem, ManifestEntry, MediaInventory,
    RegisterDisplayRequest, RegisterDisplayResponse, RequiredFiles, Schedule, ScheduleEntry,
    StatRecord, StatsBatch,
};
pub use service::RemoteService;
