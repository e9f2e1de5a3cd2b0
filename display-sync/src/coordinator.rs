//! The content sync loop
//!
//! One background thread polls the CMS: register, bring the cache in line
//! with the manifest, resolve the schedule, hand the selection to the player,
//! flush statistics, then idle until the next poll or an early wake.
//!
//! Every failure in here is logged and retried on the next cycle. When the
//! CMS is unreachable the persisted snapshots keep the display playing.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use xmds_api::{
    EntryKind, GetFileRequest, GetResourceRequest, InventoryItem, ManifestEntry, MediaInventory,
    RegisterDisplayRequest, RemoteService, RequiredFiles, Schedule,
};

use crate::cache::{ContentCache, SnapshotKind};
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::events::{Handoff, HandoffOutcome, SyncEvent};
use crate::resolver::{resolve, LayoutSelection};
use crate::shutdown::{StopSignal, WaitOutcome};
use crate::stats::StatsQueue;

/// Where the loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Init,
    Register,
    SyncManifest,
    ResolveSchedule,
    EmitSelection,
    FlushStats,
    Idle,
    Stopped,
}

/// What one pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub registered: bool,
    /// The manifest differed from the snapshot and a download pass ran
    pub manifest_changed: bool,
    pub downloaded: usize,
    pub failed: usize,
    pub selection: Option<LayoutSelection>,
    pub stats_flushed: usize,
}

fn system_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Polls the CMS and keeps the content cache current
pub struct ContentSyncCoordinator {
    service: Arc<dyn RemoteService>,
    cache: ContentCache,
    config: SyncConfig,
    registration: RegisterDisplayRequest,
    stats: StatsQueue,
    subscribers: Vec<Sender<SyncEvent>>,
    stop: StopSignal,
    state: Arc<Mutex<SyncState>>,
    interval: Duration,
    manifest: Option<RequiredFiles>,
    clock: fn() -> i64,
}

impl ContentSyncCoordinator {
    /// Create a coordinator; the save directory is created here
    pub fn new(
        service: Arc<dyn RemoteService>,
        config: SyncConfig,
        registration: RegisterDisplayRequest,
    ) -> Result<Self> {
        let cache = ContentCache::from_config(&config)?;
        Ok(Self {
            service,
            cache,
            interval: config.poll_interval,
            config,
            registration,
            stats: StatsQueue::new(),
            subscribers: Vec::new(),
            stop: StopSignal::new(),
            state: Arc::new(Mutex::new(SyncState::Init)),
            manifest: None,
            clock: system_now,
        })
    }

    /// Share an existing stats queue instead of the coordinator's own
    pub fn with_stats_queue(mut self, stats: StatsQueue) -> Self {
        self.stats = stats;
        self
    }

    /// Replace the wall clock (epoch seconds)
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// Receive every event published from now on
    pub fn subscribe(&mut self) -> Receiver<SyncEvent> {
        let (tx, rx) = channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub fn stats_queue(&self) -> StatsQueue {
        self.stats.clone()
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    pub fn state(&self) -> SyncState {
        *self.state.lock()
    }

    /// Current poll interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Last manifest seen, live or from the snapshot
    pub fn manifest(&self) -> Option<&RequiredFiles> {
        self.manifest.as_ref()
    }

    /// Spawn the loop on its own thread
    pub fn start(self) -> CoordinatorHandle {
        let stop = self.stop.clone();
        let state = Arc::clone(&self.state);
        let running = Arc::new(AtomicBool::new(true));
        let running_flag = Arc::clone(&running);

        let thread = thread::Builder::new()
            .name("xibo-sync".to_string())
            .spawn(move || {
                self.run();
                running_flag.store(false, Ordering::SeqCst);
            });

        let thread = match thread {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!("Failed to spawn sync thread: {}", e);
                running.store(false, Ordering::SeqCst);
                None
            }
        };

        CoordinatorHandle {
            stop,
            state,
            running,
            thread,
        }
    }

    /// Run until stopped (or after one pass in single-shot mode)
    pub fn run(mut self) {
        tracing::info!(save_dir = %self.cache.root().display(), "sync loop started");

        while !self.stop.is_stopped() {
            let report = self.run_cycle();
            tracing::debug!(?report, "sync cycle finished");

            if self.config.single_shot {
                break;
            }

            self.set_state(SyncState::Idle);
            match self.stop.wait_timeout(self.interval) {
                WaitOutcome::Woken => tracing::info!("early sync requested"),
                WaitOutcome::Stopped | WaitOutcome::TimedOut => {}
            }
        }

        self.set_state(SyncState::Stopped);
        tracing::info!("sync loop finished");
    }

    /// One full pass through the state machine
    pub fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();

        self.set_state(SyncState::Register);
        report.registered = self.register();
        if self.stop.is_stopped() {
            return report;
        }

        self.set_state(SyncState::SyncManifest);
        self.sync_manifest(&mut report);
        if self.stop.is_stopped() {
            return report;
        }

        self.set_state(SyncState::ResolveSchedule);
        report.selection = self
            .current_schedule()
            .and_then(|schedule| resolve(&schedule, (self.clock)(), &self.config.time_format));
        if self.stop.is_stopped() {
            return report;
        }

        self.set_state(SyncState::EmitSelection);
        match &report.selection {
            Some(selection) => self.emit_selection(selection.clone()),
            None => tracing::warn!("no layout to play: schedule has no match and no default"),
        }
        if self.stop.is_stopped() {
            return report;
        }

        self.set_state(SyncState::FlushStats);
        match self.stats.flush(self.service.as_ref(), &self.config.time_format) {
            Ok(count) => report.stats_flushed = count,
            Err(e) => tracing::warn!("Failed to submit stats, keeping them queued: {}", e),
        }

        report
    }

    fn set_state(&self, state: SyncState) {
        tracing::trace!(?state, "sync state");
        *self.state.lock() = state;
    }

    fn publish(&mut self, event: SyncEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn register(&mut self) -> bool {
        match self.service.register_display(&self.registration) {
            Ok(response) if response.is_ready() => {
                if let Some(interval) = response.collect_interval() {
                    if interval != self.interval {
                        tracing::info!(seconds = interval.as_secs_f64(), "poll interval updated");
                    }
                    self.interval = interval;
                }
                true
            }
            Ok(response) => {
                tracing::warn!(
                    code = %response.code,
                    message = %response.message,
                    "display is not ready"
                );
                false
            }
            Err(e) => {
                tracing::warn!("RegisterDisplay failed: {}", e);
                false
            }
        }
    }

    fn sync_manifest(&mut self, report: &mut CycleReport) {
        let manifest = match self.service.required_files() {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::warn!("RequiredFiles failed, using snapshot: {}", e);
                if self.manifest.is_none() {
                    self.manifest = self
                        .cache
                        .load_snapshot(SnapshotKind::RequiredFiles)
                        .and_then(|text| RequiredFiles::parse(&text).ok());
                }
                return;
            }
        };

        if self.cache.snapshot_matches(SnapshotKind::RequiredFiles, &manifest.content_digest()) {
            tracing::debug!(files = manifest.files.len(), "manifest unchanged");
            self.manifest = Some(manifest);
            return;
        }

        report.manifest_changed = true;
        tracing::info!(files = manifest.files.len(), "manifest changed, syncing content");

        let complete = self.download_all(&manifest, report);
        if !self.stop.is_stopped() {
            self.report_inventory(&manifest);
        }

        if complete {
            if let Err(e) = self
                .cache
                .persist_snapshot(SnapshotKind::RequiredFiles, &manifest.content)
            {
                tracing::warn!("Failed to persist manifest snapshot: {}", e);
            }
        } else {
            tracing::info!(failed = report.failed, "content sync incomplete, retrying next cycle");
        }

        self.manifest = Some(manifest);
    }

    /// Returns whether every entry is now in place
    fn download_all(&mut self, manifest: &RequiredFiles, report: &mut CycleReport) -> bool {
        let mut complete = true;

        for entry in &manifest.files {
            if self.stop.is_stopped() {
                return false;
            }

            let result = match &entry.kind {
                EntryKind::Resource => self.fetch_resource(entry).map(Some),
                EntryKind::Media | EntryKind::Layout => {
                    let path = self.cache.path_for(entry);
                    if entry.has_digest() && self.cache.digest_matches(&path, &entry.digest) {
                        tracing::trace!(id = %entry.id, "skipping, digest matches");
                        Ok(None)
                    } else {
                        self.fetch_file(entry, path).map(Some)
                    }
                }
                EntryKind::Unknown(kind) => {
                    tracing::debug!(id = %entry.id, kind = %kind, "ignoring entry of unknown type");
                    Ok(None)
                }
            };

            match result {
                Ok(Some(path)) => {
                    report.downloaded += 1;
                    tracing::debug!(id = %entry.id, path = %path.display(), "downloaded");
                    self.publish(SyncEvent::FileDownloaded(entry.clone()));
                }
                Ok(None) => {}
                Err(SyncError::Cancelled) => return false,
                Err(e) => {
                    complete = false;
                    report.failed += 1;
                    tracing::warn!(id = %entry.id, kind = %entry.kind, "Download failed: {}", e);
                }
            }
        }

        complete
    }

    fn fetch_resource(&mut self, entry: &ManifestEntry) -> Result<PathBuf> {
        let path = self.cache.path_for(entry);
        self.publish(SyncEvent::FileDownloading {
            kind: entry.kind.clone(),
            path: path.clone(),
        });

        let html = self.service.get_resource(&GetResourceRequest {
            layout_id: entry.layout_id.clone(),
            region_id: entry.region_id.clone(),
            media_id: entry.media_id.clone(),
        })?;

        self.cache.write_atomic(&path, html.as_bytes())?;
        Ok(path)
    }

    fn fetch_file(&mut self, entry: &ManifestEntry, path: PathBuf) -> Result<PathBuf> {
        self.publish(SyncEvent::FileDownloading {
            kind: entry.kind.clone(),
            path: path.clone(),
        });

        let mut download = self.cache.begin_download(&path)?;
        let chunk_size = self.config.chunk_size.max(1);

        while download.written() < entry.size {
            if self.stop.is_stopped() {
                return Err(SyncError::Cancelled);
            }

            let offset = download.written();
            let chunk = self.service.get_file(&GetFileRequest {
                file_id: entry.id.clone(),
                file_type: entry.kind.clone(),
                chunk_offset: offset,
                chunk_size: chunk_size.min(entry.size - offset),
            })?;

            if chunk.is_empty() {
                return Err(SyncError::Parse(format!(
                    "empty chunk at offset {} of {}",
                    offset, entry.id
                )));
            }
            download.write_chunk(&chunk)?;
        }

        let expected = entry.has_digest().then_some(entry.digest.as_str());
        download.commit(expected)
    }

    fn report_inventory(&self, manifest: &RequiredFiles) {
        let now = (self.clock)();
        let items: Vec<InventoryItem> = manifest
            .files
            .iter()
            .filter(|e| matches!(e.kind, EntryKind::Media | EntryKind::Layout))
            .map(|entry| {
                let path = self.cache.path_for(entry);
                let complete = if entry.has_digest() {
                    self.cache.digest_matches(&path, &entry.digest)
                } else {
                    path.is_file()
                };
                InventoryItem {
                    id: entry.id.clone(),
                    complete: u8::from(complete),
                    md5: entry.digest.clone(),
                    last_checked: now,
                }
            })
            .collect();

        if items.is_empty() {
            return;
        }

        let inventory = MediaInventory { items };
        match self.service.media_inventory(&inventory) {
            Ok(_) => tracing::debug!(
                complete = inventory.complete_count(),
                total = inventory.items.len(),
                "media inventory reported"
            ),
            Err(e) => tracing::warn!("MediaInventory failed: {}", e),
        }
    }

    fn current_schedule(&self) -> Option<Schedule> {
        match self.service.schedule() {
            Ok(schedule) => {
                if !self
                    .cache
                    .snapshot_matches(SnapshotKind::Schedule, &schedule.content_digest())
                {
                    if let Err(e) = self
                        .cache
                        .persist_snapshot(SnapshotKind::Schedule, &schedule.content)
                    {
                        tracing::warn!("Failed to persist schedule snapshot: {}", e);
                    }
                }
                Some(schedule)
            }
            Err(e) => {
                tracing::warn!("Schedule failed, using snapshot: {}", e);
                let text = self.cache.load_snapshot(SnapshotKind::Schedule)?;
                match Schedule::parse(&text) {
                    Ok(schedule) => Some(schedule),
                    Err(e) => {
                        tracing::warn!("Schedule snapshot unusable: {}", e);
                        None
                    }
                }
            }
        }
    }

    fn emit_selection(&mut self, selection: LayoutSelection) {
        tracing::debug!(
            layout = %selection.layout_id,
            schedule = ?selection.schedule_id,
            from = selection.window.0,
            to = selection.window.1,
            "layout selected"
        );

        let handoff = Handoff::new();
        self.publish(SyncEvent::LayoutSelected {
            selection,
            ticket: handoff.ticket(),
        });

        match handoff.wait(self.config.handoff_timeout, self.config.stop_granularity, &self.stop) {
            HandoffOutcome::Released | HandoffOutcome::Stopped => {}
            HandoffOutcome::TimedOut => {
                tracing::warn!("layout selection was not acknowledged in time")
            }
        }
    }
}

/// Control handle for a running [`ContentSyncCoordinator`]
#[derive(Debug)]
pub struct CoordinatorHandle {
    stop: StopSignal,
    state: Arc<Mutex<SyncState>>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CoordinatorHandle {
    /// Ask the loop to stop at its next checkpoint
    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    /// Cut the idle wait short and start the next cycle now
    pub fn request_sync(&self) {
        self.stop.wake();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> SyncState {
        *self.state.lock()
    }

    /// Stop and wait for the loop thread to exit
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the loop thread to exit
    pub fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("sync thread panicked");
            }
        }
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Drop for CoordinatorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
