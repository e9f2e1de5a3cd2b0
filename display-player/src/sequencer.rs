//! Layout sequencing
//!
//! The [`PlaybackSequencer`] owns whichever layout is on screen. It reacts to
//! sync events (a new selection, a fresh download of the current layout) and
//! to expiry of the current schedule window, and swaps layouts by tearing
//! every region down before the next one starts.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError};
use display_sync::{LayoutSelection, StatsQueue, StopSignal, SyncEvent};
use xmds_api::EntryKind;

use crate::config::PlayerConfig;
use crate::events::{EventBus, PlaybackEvent};
use crate::layout::Layout;
use crate::media::MediaContext;
use crate::process::ProcessLauncher;
use crate::region::{RegionExecutor, RegionHandle};
use crate::render::Renderer;

type ResyncHandler = Box<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
struct CurrentLayout {
    layout_id: String,
    schedule_id: Option<String>,
    /// Epoch seconds at which the selection runs out
    expires_at: Option<i64>,
}

/// Decides what is on screen
pub struct PlaybackSequencer {
    ctx: Arc<MediaContext>,
    regions: Vec<RegionHandle>,
    current: Option<CurrentLayout>,
    on_resync: Option<ResyncHandler>,
    stop: StopSignal,
}

impl PlaybackSequencer {
    pub fn new(
        config: PlayerConfig,
        renderer: Arc<dyn Renderer>,
        launcher: Arc<dyn ProcessLauncher>,
        stats: StatsQueue,
    ) -> Self {
        Self::with_context(MediaContext::new(config, renderer, launcher, stats))
    }

    pub fn with_context(ctx: MediaContext) -> Self {
        Self {
            ctx: Arc::new(ctx),
            regions: Vec::new(),
            current: None,
            on_resync: None,
            stop: StopSignal::new(),
        }
    }

    /// Called when the current selection expires and a fresh schedule is needed
    pub fn on_resync(&mut self, handler: impl Fn() + Send + Sync + 'static) {
        self.on_resync = Some(Box::new(handler));
    }

    pub fn events(&self) -> EventBus {
        self.ctx.events.clone()
    }

    pub fn subscribe(&self) -> Receiver<PlaybackEvent> {
        self.ctx.events.subscribe()
    }

    pub fn current_layout(&self) -> Option<&str> {
        self.current.as_ref().map(|c| c.layout_id.as_str())
    }

    /// Number of regions with a live executor
    pub fn running_regions(&self) -> usize {
        self.regions.iter().filter(|r| r.is_running()).count()
    }

    fn layout_path(&self, layout_id: &str) -> PathBuf {
        let config = &self.ctx.config;
        config
            .save_dir
            .join(format!("{}{}", layout_id, config.layout_ext))
    }

    /// Apply one event from the sync loop
    pub fn handle_sync_event(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::LayoutSelected { selection, ticket } => {
                self.apply_selection(selection);
                ticket.acknowledge();
            }
            SyncEvent::FileDownloaded(entry) => {
                let is_current = self.current_layout() == Some(entry.id.as_str());
                if entry.kind == EntryKind::Layout && is_current {
                    tracing::info!(layout = %entry.id, "current layout updated, reloading");
                    if let Some(current) = self.current.clone() {
                        self.stop_layout();
                        self.start_layout(&current.layout_id, current.schedule_id.clone());
                        self.current = Some(current);
                    }
                }
            }
            SyncEvent::FileDownloading { kind, path } => {
                tracing::trace!(%kind, path = %path.display(), "downloading");
            }
        }
    }

    fn apply_selection(&mut self, selection: LayoutSelection) {
        let expires_at = selection.expires_at();
        let LayoutSelection {
            layout_id,
            schedule_id,
            ..
        } = selection;

        if self.current_layout() != Some(layout_id.as_str()) {
            tracing::info!(layout = %layout_id, schedule = ?schedule_id, "switching layout");
            self.stop_layout();
            self.start_layout(&layout_id, schedule_id.clone());
        }

        self.current = Some(CurrentLayout {
            layout_id,
            schedule_id,
            expires_at,
        });
    }

    /// Tear down on window expiry and ask for a new schedule.
    ///
    /// Returns whether the current layout expired.
    pub fn check_expiry(&mut self, now: i64) -> bool {
        let expired = matches!(
            &self.current,
            Some(CurrentLayout { expires_at: Some(at), .. }) if now > *at
        );
        if !expired {
            return false;
        }

        tracing::info!(layout = ?self.current_layout(), "schedule window ended");
        self.stop_layout();
        self.current = None;
        if let Some(handler) = &self.on_resync {
            handler();
        }
        true
    }

    fn start_layout(&mut self, layout_id: &str, schedule_id: Option<String>) {
        let path = self.layout_path(layout_id);
        let layout = match Layout::load(layout_id, &path) {
            Ok(layout) => layout,
            Err(e) => {
                tracing::warn!(layout = %layout_id, "Cannot play layout: {}", e);
                return;
            }
        };

        if let Some(color) = &layout.background_color {
            self.ctx.renderer.set_background(color);
        }

        self.regions = layout
            .regions
            .into_iter()
            .map(|region| {
                RegionExecutor::new(layout_id, schedule_id.clone(), region, Arc::clone(&self.ctx))
                    .spawn()
            })
            .collect();

        tracing::debug!(layout = %layout_id, regions = self.regions.len(), "layout started");
        self.ctx
            .events
            .publish(PlaybackEvent::LayoutStarted(layout_id.to_string()));
    }

    /// Stop every region, escalating to a forced stop for stragglers
    pub fn stop_layout(&mut self) {
        if self.regions.is_empty() {
            return;
        }

        for region in &self.regions {
            region.request_stop();
        }

        let config = &self.ctx.config;
        for mut region in self.regions.drain(..) {
            let mut tries = config.teardown_tries;
            while region.is_running() && tries > 0 {
                thread::sleep(config.teardown_interval);
                tries -= 1;
            }
            if region.is_running() {
                tracing::warn!(region = %region.region_id(), "region did not stop, forcing");
                region.force_stop();
            }
            region.join();
        }

        if let Some(current) = &self.current {
            self.ctx
                .events
                .publish(PlaybackEvent::LayoutStopped(current.layout_id.clone()));
        }
    }

    fn next_timeout(&self, now: i64) -> Duration {
        let granularity = self.ctx.config.poll_interval;
        match self.current.as_ref().and_then(|c| c.expires_at) {
            // the window end itself is still inside the window
            Some(at) if at >= now => {
                granularity.min(Duration::from_secs(at.saturating_sub(now).saturating_add(1) as u64))
            }
            Some(_) => Duration::ZERO,
            None => granularity,
        }
    }

    /// Consume sync events on a new thread until stopped
    pub fn start(mut self, events: Receiver<SyncEvent>) -> PlaybackHandle {
        let stop = self.stop.clone();
        let running = Arc::new(AtomicBool::new(true));
        let running_flag = Arc::clone(&running);

        let thread = thread::Builder::new()
            .name("xibo-playback".to_string())
            .spawn(move || {
                self.run(events);
                running_flag.store(false, Ordering::SeqCst);
            });

        let thread = match thread {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!("Failed to spawn playback thread: {}", e);
                running.store(false, Ordering::SeqCst);
                None
            }
        };

        PlaybackHandle {
            stop,
            running,
            thread,
        }
    }

    fn run(&mut self, events: Receiver<SyncEvent>) {
        tracing::info!("playback sequencer started");
        let clock = self.ctx.clock;
        let mut connected = true;

        while !self.stop.is_stopped() {
            let timeout = self.next_timeout(clock());
            if connected {
                match events.recv_timeout(timeout) {
                    Ok(event) => self.handle_sync_event(event),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => {
                        tracing::debug!("sync event channel closed");
                        connected = false;
                    }
                }
            } else {
                self.stop.wait_timeout(timeout);
            }
            self.check_expiry(clock());
        }

        self.stop_layout();
        self.current = None;
        tracing::info!("playback sequencer stopped");
    }
}

/// Control handle for a running [`PlaybackSequencer`]
#[derive(Debug)]
pub struct PlaybackHandle {
    stop: StopSignal,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl PlaybackHandle {
    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop playback and wait for every region to wind down
    pub fn stop(&mut self) {
        self.request_stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("playback thread panicked");
            }
        }
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Drop for PlaybackHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessRenderer;
    use crate::test_support::{fast_config, FakeLauncher};
    use display_sync::SelectionTicket;
    use std::fs;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;
    use tempfile::TempDir;
    use xmds_api::ManifestEntry;

    const LAYOUT: &str = r##"<layout width="100" height="100" bgcolor="#ff0000">
        <region id="r1" width="50" height="100" left="0" top="0">
            <options><loop>1</loop></options>
            <media id="m1" type="image" duration="0.02" render="native"><options><uri>a.png</uri></options></media>
        </region>
        <region id="r2" width="50" height="100" left="50" top="0">
            <options><loop>1</loop></options>
            <media id="m2" type="text" duration="0.02" render="html"/>
        </region>
    </layout>"##;

    struct Harness {
        dir: TempDir,
        renderer: Arc<HeadlessRenderer>,
        sequencer: PlaybackSequencer,
        events: Receiver<PlaybackEvent>,
    }

    fn harness() -> Harness {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("1.xml"), LAYOUT).unwrap();
        fs::write(dir.path().join("2.xml"), LAYOUT).unwrap();

        let renderer = Arc::new(HeadlessRenderer::new());
        let sequencer = PlaybackSequencer::new(
            fast_config(dir.path()),
            renderer.clone(),
            Arc::new(FakeLauncher::default()),
            StatsQueue::new(),
        );
        let events = sequencer.subscribe();
        Harness {
            dir,
            renderer,
            sequencer,
            events,
        }
    }

    fn selected(layout: &str, window: (i64, i64)) -> SyncEvent {
        SyncEvent::LayoutSelected {
            selection: LayoutSelection {
                layout_id: layout.to_string(),
                schedule_id: (window != (0, 0)).then(|| "5".to_string()),
                window,
            },
            ticket: SelectionTicket::detached(),
        }
    }

    fn layout_events(events: &Receiver<PlaybackEvent>) -> Vec<PlaybackEvent> {
        events
            .try_iter()
            .filter(|e| {
                matches!(
                    e,
                    PlaybackEvent::LayoutStarted(_) | PlaybackEvent::LayoutStopped(_)
                )
            })
            .collect()
    }

    #[test]
    fn test_selection_starts_layout_once() {
        let mut h = harness();
        let event = selected("1", (0, 0));
        h.sequencer.handle_sync_event(event);

        assert_eq!(h.sequencer.current_layout(), Some("1"));
        assert_eq!(h.sequencer.regions.len(), 2);
        assert_eq!(h.renderer.background().as_deref(), Some("#ff0000"));

        let again = selected("1", (0, 0));
        h.sequencer.handle_sync_event(again);
        h.sequencer.stop_layout();

        assert_eq!(
            layout_events(&h.events),
            vec![
                PlaybackEvent::LayoutStarted("1".to_string()),
                PlaybackEvent::LayoutStopped("1".to_string()),
            ]
        );
    }

    #[test]
    fn test_swap_stops_before_starting() {
        let mut h = harness();
        h.sequencer.handle_sync_event(selected("1", (0, 0)));
        h.sequencer.handle_sync_event(selected("2", (0, 0)));

        assert_eq!(h.sequencer.current_layout(), Some("2"));
        assert_eq!(
            layout_events(&h.events),
            vec![
                PlaybackEvent::LayoutStarted("1".to_string()),
                PlaybackEvent::LayoutStopped("1".to_string()),
                PlaybackEvent::LayoutStarted("2".to_string()),
            ]
        );

        // no media from layout 1 may still be on screen
        let deadline = Instant::now() + Duration::from_millis(200);
        while Instant::now() < deadline {
            if let Ok(PlaybackEvent::MediaStarted(info)) = h.events.recv_timeout(Duration::from_millis(20)) {
                assert_eq!(info.layout_id, "2");
            }
        }
        h.sequencer.stop_layout();
    }

    #[test]
    fn test_missing_layout_is_reloaded_after_download() {
        let mut h = harness();
        h.sequencer.handle_sync_event(selected("3", (0, 0)));
        assert_eq!(h.sequencer.current_layout(), Some("3"));
        assert!(h.sequencer.regions.is_empty());

        fs::write(h.dir.path().join("3.xml"), LAYOUT).unwrap();
        h.sequencer.handle_sync_event(SyncEvent::FileDownloaded(ManifestEntry {
            kind: EntryKind::Layout,
            id: "3".to_string(),
            size: 0,
            digest: String::new(),
            download: String::new(),
            path: "3".to_string(),
            layout_id: String::new(),
            region_id: String::new(),
            media_id: String::new(),
        }));

        assert_eq!(h.sequencer.regions.len(), 2);
        assert_eq!(
            layout_events(&h.events),
            vec![PlaybackEvent::LayoutStarted("3".to_string())]
        );
        h.sequencer.stop_layout();
    }

    #[test]
    fn test_expiry_tears_down_and_requests_sync() {
        let mut h = harness();
        let resyncs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&resyncs);
        h.sequencer.on_resync(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        h.sequencer.handle_sync_event(selected("1", (100, 200)));
        assert!(!h.sequencer.check_expiry(150));
        assert!(!h.sequencer.check_expiry(200));
        assert_eq!(h.sequencer.current_layout(), Some("1"));
        assert!(h.sequencer.check_expiry(201));

        assert_eq!(h.sequencer.current_layout(), None);
        assert_eq!(h.sequencer.running_regions(), 0);
        assert_eq!(resyncs.load(Ordering::SeqCst), 1);
        assert!(!h.sequencer.check_expiry(300));
    }

    #[test]
    fn test_expiry_waits_past_window_end() {
        let mut h = harness();
        h.sequencer.handle_sync_event(selected("1", (100, 200)));

        assert!(h.sequencer.next_timeout(200) > Duration::ZERO);
        assert_eq!(h.sequencer.next_timeout(201), Duration::ZERO);
        h.sequencer.stop_layout();
    }

    #[test]
    fn test_default_layout_never_expires() {
        let mut h = harness();
        h.sequencer.handle_sync_event(selected("1", (0, 0)));
        assert!(!h.sequencer.check_expiry(i64::MAX));
        h.sequencer.stop_layout();
    }

    #[test]
    fn test_threaded_sequencer_stops_cleanly() {
        let h = harness();
        let (tx, rx) = crossbeam::channel::unbounded();
        let events = h.events;
        let mut handle = h.sequencer.start(rx);

        tx.send(selected("1", (0, 0))).unwrap();
        let started = events
            .iter()
            .find(|e| matches!(e, PlaybackEvent::LayoutStarted(_)));
        assert!(started.is_some());

        handle.stop();
        assert!(!handle.is_running());
        assert!(events
            .try_iter()
            .any(|e| e == PlaybackEvent::LayoutStopped("1".to_string())));
    }
}
