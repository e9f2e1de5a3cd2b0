//! XMDS operations
//!
//! One module per SOAP action the display uses. Each module owns the typed
//! request/response for its action plus the document model it returns.

pub mod get_file;
pub mod get_resource;
pub mod media_inventory;
pub mod register_display;
pub mod required_files;
pub mod schedule;
pub mod submit_stats;

pub use get_file::{GetFileOperation, GetFileRequest};
pub use get_resource::{GetResourceOperation, GetResourceRequest};
pub use media_inventory::{InventoryItem, MediaInventory, MediaInventoryOperation};
pub use register_display::{RegisterDisplayOperation, RegisterDisplayRequest, RegisterDisplayResponse};
pub use required_files::{EntryKind, ManifestEntry, RequiredFiles, RequiredFilesOperation};
pub use schedule::{Schedule, ScheduleEntry, ScheduleOperation};
pub use submit_stats::{StatRecord, StatsBatch, SubmitStatsOperation};
