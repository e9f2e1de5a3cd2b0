//! The remote service seam
//!
//! The sync loop only talks to the CMS through [`RemoteService`], so tests
//! and alternative transports can stand in for [`crate::XmdsClient`].

use crate::operations::{
    GetFileRequest, GetResourceRequest, MediaInventory, RegisterDisplayRequest,
    RegisterDisplayResponse, RequiredFiles, Schedule, StatsBatch,
};
use crate::Result;

/// Capabilities the display consumes from the CMS
pub trait RemoteService: Send + Sync {
    /// Announce the display and receive its status and poll interval
    fn register_display(&self, request: &RegisterDisplayRequest) -> Result<RegisterDisplayResponse>;

    /// Manifest of files the display must hold
    fn required_files(&self) -> Result<RequiredFiles>;

    /// Current schedule
    fn schedule(&self) -> Result<Schedule>;

    /// One chunk of a media or layout file
    fn get_file(&self, request: &GetFileRequest) -> Result<Vec<u8>>;

    /// Rendered HTML for a widget
    fn get_resource(&self, request: &GetResourceRequest) -> Result<String>;

    /// Submit proof-of-play records; `Ok(true)` confirms receipt
    fn submit_stats(&self, batch: &StatsBatch) -> Result<bool>;

    /// Report local file completeness
    fn media_inventory(&self, inventory: &MediaInventory) -> Result<bool>;
}
