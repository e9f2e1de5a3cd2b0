//! Region executors
//!
//! Each region of the active layout gets its own thread that plays the
//! region's media list in order. The index moves forward only after the
//! current unit has finished.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use display_sync::StopSignal;
use parking_lot::Mutex;

use crate::events::MediaInfo;
use crate::layout::Region;
use crate::media::{MediaContext, MediaUnit};

/// Plays one region's media list
pub struct RegionExecutor {
    layout_id: String,
    schedule_id: Option<String>,
    region: Region,
    ctx: Arc<MediaContext>,
    stop: StopSignal,
    current: Arc<Mutex<Option<MediaUnit>>>,
}

impl RegionExecutor {
    pub fn new(
        layout_id: impl Into<String>,
        schedule_id: Option<String>,
        region: Region,
        ctx: Arc<MediaContext>,
    ) -> Self {
        Self {
            layout_id: layout_id.into(),
            schedule_id,
            region,
            ctx,
            stop: StopSignal::new(),
            current: Arc::new(Mutex::new(None)),
        }
    }

    /// Start playing on a new thread
    pub fn spawn(self) -> RegionHandle {
        let region_id = self.region.id.clone();
        let stop = self.stop.clone();
        let current = Arc::clone(&self.current);
        let running = Arc::new(AtomicBool::new(true));
        let running_flag = Arc::clone(&running);

        let thread = thread::Builder::new()
            .name(format!("region-{}", region_id))
            .spawn(move || {
                self.run();
                running_flag.store(false, Ordering::SeqCst);
            });

        let thread = match thread {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!(region = %region_id, "Failed to spawn region thread: {}", e);
                running.store(false, Ordering::SeqCst);
                None
            }
        };

        RegionHandle {
            region_id,
            stop,
            current,
            running,
            thread,
        }
    }

    /// Play until the list ends (non-looping) or a stop is requested
    pub fn run(self) {
        let count = self.region.media.len();
        if count == 0 {
            tracing::debug!(region = %self.region.id, "region has no media");
            return;
        }

        let mut index = 0;
        let mut sequence = 0u64;

        while !self.stop.is_stopped() {
            let spec = self.region.media[index].clone();
            let info = MediaInfo {
                layout_id: self.layout_id.clone(),
                region_id: self.region.id.clone(),
                media_id: spec.id.clone(),
                schedule_id: self.schedule_id.clone(),
                kind: spec.kind,
                sequence,
            };
            let unit = MediaUnit::new(info, spec, self.region.geometry, Arc::clone(&self.ctx));

            *self.current.lock() = Some(unit.clone());
            unit.play(&self.stop);
            *self.current.lock() = None;
            sequence += 1;

            if self.stop.is_stopped() {
                break;
            }

            if !unit.was_started() {
                self.stop.wait_timeout(self.ctx.config.failure_backoff);
            }

            index += 1;
            if index >= count {
                if !self.region.loop_media {
                    break;
                }
                index = 0;
            }
        }

        tracing::debug!(region = %self.region.id, plays = sequence, "region finished");
    }
}

/// Control handle for a running region
#[derive(Debug)]
pub struct RegionHandle {
    region_id: String,
    stop: StopSignal,
    current: Arc<Mutex<Option<MediaUnit>>>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl RegionHandle {
    pub fn region_id(&self) -> &str {
        &self.region_id
    }

    /// Stop after (or while) the current unit finishes
    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Unit currently on screen, if any
    pub fn current(&self) -> Option<MediaUnit> {
        self.current.lock().clone()
    }

    /// Stop and kill whatever is on screen
    pub fn force_stop(&self) {
        self.request_stop();
        if let Some(unit) = self.current() {
            unit.force_stop();
        }
    }

    pub fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!(region = %self.region_id, "region thread panicked");
            }
        }
    }
}
