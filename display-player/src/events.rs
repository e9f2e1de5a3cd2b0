//! Playback notifications

use std::sync::Arc;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

use crate::layout::MediaKind;

/// Describes one play of one media item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInfo {
    pub layout_id: String,
    pub region_id: String,
    pub media_id: String,
    pub schedule_id: Option<String>,
    pub kind: MediaKind,
    pub sequence: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    MediaStarted(MediaInfo),
    MediaFinished(MediaInfo),
    LayoutStarted(String),
    LayoutStopped(String),
}

/// Fan-out of [`PlaybackEvent`]s to any number of subscribers
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Sender<PlaybackEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<PlaybackEvent> {
        let (tx, rx) = channel::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Deliver to every live subscriber, forgetting dropped ones
    pub fn publish(&self, event: PlaybackEvent) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}
