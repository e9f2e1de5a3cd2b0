//! The on-screen side of playback
//!
//! Media units never draw anything themselves; they ask a [`Renderer`] for a
//! view and close it when they finish. [`HeadlessRenderer`] keeps the views
//! in memory, which is enough for kiosks driven by an external compositor
//! and for tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::Result;
use crate::layout::Geometry;

/// Handle of an open view; doubles as the native window id for embedded players
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId(pub u64);

/// What a view should show
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewContent {
    /// A still image, scaled to the region
    Image(PathBuf),
    /// A remote page
    Url(String),
    /// A cached HTML file
    Page(PathBuf),
    /// An empty surface for an external player to draw into
    Surface,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowRequest {
    pub geometry: Geometry,
    pub content: ViewContent,
}

/// Display surface abstraction
pub trait Renderer: Send + Sync {
    /// Open a view and bring it to the front
    fn show(&self, request: &ShowRequest) -> Result<ViewId>;

    /// Close a view; `false` means "not yet, try again"
    fn close(&self, view: ViewId) -> bool;

    /// Fill the layout background
    fn set_background(&self, color: &str);
}

/// Renderer that only tracks state
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    next_id: AtomicU64,
    views: Mutex<HashMap<ViewId, ShowRequest>>,
    history: Mutex<Vec<ShowRequest>>,
    background: Mutex<Option<String>>,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Views currently open
    pub fn open_views(&self) -> usize {
        self.views.lock().len()
    }

    /// Every request ever shown, oldest first
    pub fn history(&self) -> Vec<ShowRequest> {
        self.history.lock().clone()
    }

    pub fn background(&self) -> Option<String> {
        self.background.lock().clone()
    }
}

impl Renderer for HeadlessRenderer {
    fn show(&self, request: &ShowRequest) -> Result<ViewId> {
        let view = ViewId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        tracing::debug!(view = view.0, content = ?request.content, "show");
        self.views.lock().insert(view, request.clone());
        self.history.lock().push(request.clone());
        Ok(view)
    }

    fn close(&self, view: ViewId) -> bool {
        self.views.lock().remove(&view);
        true
    }

    fn set_background(&self, color: &str) {
        *self.background.lock() = Some(color.to_string());
    }
}
