//! Registry of media currently on screen

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

/// Identity of one play of one media item
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaKey {
    pub layout_id: String,
    pub region_id: String,
    pub media_id: String,
    /// Per-region play counter
    pub sequence: u64,
}

/// Set of playing media, shared by all regions
///
/// Only add, remove and membership are offered; callers never see the set
/// itself.
#[derive(Debug, Clone, Default)]
pub struct ActiveMedia {
    inner: Arc<Mutex<HashSet<MediaKey>>>,
}

impl ActiveMedia {
    pub fn new() -> Self {
        Self::default()
    }

    /// `false` when the key is already active
    pub fn add(&self, key: MediaKey) -> bool {
        self.inner.lock().insert(key)
    }

    pub fn remove(&self, key: &MediaKey) -> bool {
        self.inner.lock().remove(key)
    }

    pub fn contains(&self, key: &MediaKey) -> bool {
        self.inner.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
