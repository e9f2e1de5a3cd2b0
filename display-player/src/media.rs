//! A single play of a media item
//!
//! A [`MediaUnit`] moves CREATED → PLAYING → FINISHED and never back. Any of
//! the stop paths (play timer, region stop, player exit, watchdog, forced
//! teardown) may race each other; the transition to FINISHED happens under
//! the unit's lock, so the finish side effects run exactly once.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crossbeam::channel::RecvTimeoutError;
use display_sync::{PlaybackStat, StatsQueue, StopSignal, WaitOutcome};
use parking_lot::Mutex;

use crate::active::{ActiveMedia, MediaKey};
use crate::config::PlayerConfig;
use crate::error::{PlayerError, Result};
use crate::events::{EventBus, MediaInfo, PlaybackEvent};
use crate::layout::{Geometry, MediaKind, MediaSpec};
use crate::process::{parse_status_line, PlayerArgs, PlayerProcess, ProcessLauncher, StatusLine};
use crate::render::{Renderer, ShowRequest, ViewContent, ViewId};

const REAP_POLL: Duration = Duration::from_millis(10);

pub(crate) fn system_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Collaborators shared by every media unit
pub struct MediaContext {
    pub renderer: Arc<dyn Renderer>,
    pub launcher: Arc<dyn ProcessLauncher>,
    pub stats: StatsQueue,
    pub events: EventBus,
    pub active: ActiveMedia,
    pub config: PlayerConfig,
    /// Epoch seconds used for statistics
    pub clock: fn() -> i64,
}

impl MediaContext {
    pub fn new(
        config: PlayerConfig,
        renderer: Arc<dyn Renderer>,
        launcher: Arc<dyn ProcessLauncher>,
        stats: StatsQueue,
    ) -> Self {
        Self {
            renderer,
            launcher,
            stats,
            events: EventBus::new(),
            active: ActiveMedia::new(),
            config,
            clock: system_now,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MediaState {
    #[default]
    Created,
    Playing,
    Finished,
}

#[derive(Default)]
struct UnitState {
    lifecycle: MediaState,
    started_at: Option<i64>,
    view: Option<ViewId>,
    process: Option<Box<dyn PlayerProcess>>,
}

struct UnitShared {
    info: MediaInfo,
    spec: MediaSpec,
    geometry: Geometry,
    ctx: Arc<MediaContext>,
    state: Mutex<UnitState>,
}

/// One play of one media item; clones refer to the same play
#[derive(Clone)]
pub struct MediaUnit {
    shared: Arc<UnitShared>,
}

impl std::fmt::Debug for MediaUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaUnit")
            .field("info", &self.shared.info)
            .field("state", &self.state())
            .finish()
    }
}

impl MediaUnit {
    pub fn new(info: MediaInfo, spec: MediaSpec, geometry: Geometry, ctx: Arc<MediaContext>) -> Self {
        Self {
            shared: Arc::new(UnitShared {
                info,
                spec,
                geometry,
                ctx,
                state: Mutex::new(UnitState::default()),
            }),
        }
    }

    pub fn info(&self) -> &MediaInfo {
        &self.shared.info
    }

    pub fn state(&self) -> MediaState {
        self.shared.state.lock().lifecycle
    }

    pub fn is_finished(&self) -> bool {
        self.state() == MediaState::Finished
    }

    /// Whether playback ever began
    pub fn was_started(&self) -> bool {
        self.shared.state.lock().started_at.is_some()
    }

    pub fn key(&self) -> MediaKey {
        let info = &self.shared.info;
        MediaKey {
            layout_id: info.layout_id.clone(),
            region_id: info.region_id.clone(),
            media_id: info.media_id.clone(),
            sequence: info.sequence,
        }
    }

    /// Play to completion on the calling thread.
    ///
    /// Returns once the unit is finished or `stop` was requested. A unit that
    /// already ran, or whose key is already active, is left alone.
    pub fn play(&self, stop: &StopSignal) {
        if self.state() != MediaState::Created {
            tracing::debug!(media = %self.shared.info.media_id, "unit already played");
            return;
        }

        let ctx = &self.shared.ctx;
        let key = self.key();
        if !ctx.active.add(key.clone()) {
            tracing::debug!(media = %key.media_id, sequence = key.sequence, "unit already active");
            return;
        }

        let result = match self.shared.spec.kind {
            MediaKind::Image => self
                .media_path()
                .and_then(|path| self.play_timed(ViewContent::Image(path), stop)),
            MediaKind::Web => self.play_timed(self.web_content(), stop),
            MediaKind::Video => self.play_video(stop),
        };

        if let Err(e) = result {
            tracing::warn!(
                layout = %self.shared.info.layout_id,
                region = %self.shared.info.region_id,
                media = %self.shared.info.media_id,
                "Playback failed: {}",
                e
            );
            self.force_stop();
        }

        self.stop();
        ctx.active.remove(&key);
    }

    /// Stop gracefully; `true` if this call finished the unit
    pub fn stop(&self) -> bool {
        match self.shared.spec.kind {
            MediaKind::Video => self.stop_player(),
            MediaKind::Image | MediaKind::Web => self.finish(),
        }
    }

    /// Kill any player process and finish; `true` if this call finished the unit
    pub fn force_stop(&self) -> bool {
        let process = self.shared.state.lock().process.take();
        if let Some(mut process) = process {
            if let Err(e) = process.kill() {
                tracing::warn!(media = %self.shared.info.media_id, "Failed to kill player: {}", e);
            }
        }
        self.finish()
    }

    fn mark_started(&self) -> bool {
        {
            let mut state = self.shared.state.lock();
            if state.lifecycle != MediaState::Created {
                return false;
            }
            state.lifecycle = MediaState::Playing;
            state.started_at = Some((self.shared.ctx.clock)());
        }

        self.shared
            .ctx
            .events
            .publish(PlaybackEvent::MediaStarted(self.shared.info.clone()));
        true
    }

    fn finish(&self) -> bool {
        let (view, started_at, process) = {
            let mut state = self.shared.state.lock();
            if state.lifecycle == MediaState::Finished {
                return false;
            }
            state.lifecycle = MediaState::Finished;
            (state.view.take(), state.started_at, state.process.take())
        };

        let ctx = &self.shared.ctx;
        let info = &self.shared.info;

        if let Some(mut process) = process {
            if let Err(e) = process.kill() {
                tracing::debug!(media = %info.media_id, "Failed to kill player: {}", e);
            }
        }
        if let Some(view) = view {
            self.close_view(view);
        }

        if let Some(start_epoch) = started_at {
            ctx.stats.push(PlaybackStat {
                kind: "media".to_string(),
                start_epoch,
                finish_epoch: (ctx.clock)(),
                schedule_id: info.schedule_id.clone(),
                layout_id: info.layout_id.clone(),
                media_id: info.media_id.clone(),
            });
        }

        ctx.events.publish(PlaybackEvent::MediaFinished(info.clone()));
        true
    }

    fn close_view(&self, view: ViewId) {
        let config = &self.shared.ctx.config;
        for _ in 0..config.close_tries.max(1) {
            if self.shared.ctx.renderer.close(view) {
                return;
            }
            thread::sleep(config.close_interval);
        }
        tracing::warn!(view = view.0, "view did not close");
    }

    fn media_path(&self) -> Result<PathBuf> {
        let uri = self.shared.spec.option("uri").ok_or_else(|| {
            PlayerError::Layout(format!("media {} has no uri", self.shared.spec.id))
        })?;
        Ok(self.shared.ctx.config.save_dir.join(uri))
    }

    fn web_content(&self) -> ViewContent {
        let spec = &self.shared.spec;
        if spec.is_native_webpage() {
            if let Some(uri) = spec.option("uri") {
                let url = urlencoding::decode(uri)
                    .map(|u| u.into_owned())
                    .unwrap_or_else(|_| uri.to_string());
                return ViewContent::Url(url);
            }
        }

        let info = &self.shared.info;
        let config = &self.shared.ctx.config;
        ViewContent::Page(config.save_dir.join(format!(
            "{}_{}_{}{}",
            info.layout_id, info.region_id, info.media_id, config.resource_ext
        )))
    }

    fn show(&self, content: ViewContent) -> Result<ViewId> {
        let view = self.shared.ctx.renderer.show(&ShowRequest {
            geometry: self.shared.geometry,
            content,
        })?;
        self.shared.state.lock().view = Some(view);
        Ok(view)
    }

    /// Images and web pages: show, then hold for the configured duration
    fn play_timed(&self, content: ViewContent, stop: &StopSignal) -> Result<()> {
        self.show(content)?;
        self.mark_started();

        let config = &self.shared.ctx.config;
        let duration = self.shared.spec.duration().unwrap_or(config.default_duration);
        let deadline = Instant::now().checked_add(duration);

        // a forced stop finishes the unit without touching the region signal
        while !self.is_finished() {
            let slice = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        break;
                    }
                    remaining.min(config.poll_interval)
                }
                None => config.poll_interval,
            };
            if stop.wait_timeout(slice) == WaitOutcome::Stopped {
                break;
            }
        }
        Ok(())
    }

    fn play_video(&self, stop: &StopSignal) -> Result<()> {
        let ctx = &self.shared.ctx;
        let path = self.media_path()?;
        let view = self.show(ViewContent::Surface)?;

        let (process, lines) = ctx.launcher.spawn(&PlayerArgs {
            path,
            window: view.0,
            mute: self.shared.spec.is_muted(),
        })?;
        self.shared.state.lock().process = Some(process);

        let configured = self.shared.spec.duration();
        let spawned = Instant::now();
        let mut length: Option<Duration> = None;
        let mut deadline: Option<Instant> = None;

        loop {
            if self.is_finished() {
                return Ok(());
            }
            if stop.is_stopped() {
                self.stop_player();
                return Ok(());
            }

            let now = Instant::now();
            if deadline.map_or(false, |d| now >= d) {
                self.stop_player();
                return Ok(());
            }

            let mut slice = ctx.config.poll_interval;
            if let Some(d) = deadline {
                slice = slice.min(d - now);
            }
            if !self.was_started() {
                let watchdog = spawned + ctx.config.video_start_timeout;
                if now >= watchdog {
                    tracing::warn!(
                        media = %self.shared.info.media_id,
                        "player did not start within {:?}",
                        ctx.config.video_start_timeout
                    );
                    self.force_stop();
                    return Ok(());
                }
                slice = slice.min(watchdog - now);
            }

            match lines.recv_timeout(slice) {
                Ok(line) => match parse_status_line(&line) {
                    StatusLine::Started => {
                        if self.mark_started() {
                            deadline = configured.or(length).and_then(|d| Instant::now().checked_add(d));
                        }
                    }
                    StatusLine::Length(secs) => {
                        // zero, negative and unrepresentable lengths are ignored
                        if let Some(reported) = Duration::try_from_secs_f64(secs).ok().filter(|d| !d.is_zero()) {
                            length = Some(reported);
                            if configured.is_none() && deadline.is_none() && self.was_started() {
                                deadline = Instant::now().checked_add(reported);
                            }
                        }
                    }
                    StatusLine::Other => {}
                },
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::debug!(media = %self.shared.info.media_id, "player exited");
                    self.force_stop();
                    return Ok(());
                }
            }
        }
    }

    /// Ask the player to quit, give it the grace period, then kill it
    fn stop_player(&self) -> bool {
        let process = self.shared.state.lock().process.take();
        if let Some(mut process) = process {
            if let Err(e) = process.send_command("quit") {
                tracing::debug!("Failed to send quit: {}", e);
            }

            let grace = Instant::now() + self.shared.ctx.config.video_stop_grace;
            while Instant::now() < grace {
                match process.try_wait() {
                    Ok(None) => thread::sleep(REAP_POLL),
                    Ok(Some(_)) | Err(_) => break,
                }
            }

            if let Err(e) = process.kill() {
                tracing::debug!("Failed to reap player: {}", e);
            }
        }
        self.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fast_config, image_spec, video_spec, FakeLauncher};
    use crate::render::HeadlessRenderer;
    use crossbeam::channel::Receiver;
    use std::collections::HashMap;
    use tempfile::TempDir;

    struct Harness {
        _dir: TempDir,
        ctx: Arc<MediaContext>,
        renderer: Arc<HeadlessRenderer>,
        launcher: Arc<FakeLauncher>,
        events: Receiver<PlaybackEvent>,
        stats: StatsQueue,
    }

    fn harness(launcher: FakeLauncher) -> Harness {
        let dir = TempDir::new().unwrap();
        let renderer = Arc::new(HeadlessRenderer::new());
        let launcher = Arc::new(launcher);
        let stats = StatsQueue::new();
        let ctx = MediaContext::new(
            fast_config(dir.path()),
            renderer.clone(),
            launcher.clone(),
            stats.clone(),
        );
        let events = ctx.events.subscribe();
        Harness {
            _dir: dir,
            ctx: Arc::new(ctx),
            renderer,
            launcher,
            events,
            stats,
        }
    }

    fn unit(h: &Harness, spec: MediaSpec) -> MediaUnit {
        let info = MediaInfo {
            layout_id: "1".to_string(),
            region_id: "r1".to_string(),
            media_id: spec.id.clone(),
            schedule_id: Some("9".to_string()),
            kind: spec.kind,
            sequence: 0,
        };
        MediaUnit::new(info, spec, Geometry::default(), h.ctx.clone())
    }

    fn finished_count(events: &Receiver<PlaybackEvent>) -> usize {
        events
            .try_iter()
            .filter(|e| matches!(e, PlaybackEvent::MediaFinished(_)))
            .count()
    }

    #[test]
    fn test_image_plays_for_duration() {
        let h = harness(FakeLauncher::default());
        let unit = unit(&h, image_spec("m1", 0.05));

        let started = Instant::now();
        unit.play(&StopSignal::new());

        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(unit.is_finished());
        assert_eq!(h.renderer.open_views(), 0);
        assert_eq!(
            h.renderer.history()[0].content,
            ViewContent::Image(h.ctx.config.save_dir.join("m1.png"))
        );

        let stats = h.stats.snapshot();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].schedule_id.as_deref(), Some("9"));

        let events: Vec<_> = h.events.try_iter().collect();
        assert!(matches!(events[0], PlaybackEvent::MediaStarted(_)));
        assert!(matches!(events[1], PlaybackEvent::MediaFinished(_)));
        assert_eq!(events.len(), 2);
        assert!(h.ctx.active.is_empty());
    }

    #[test]
    fn test_finish_fires_once_across_stop_paths() {
        let h = harness(FakeLauncher::default());
        let unit = unit(&h, image_spec("m1", 30.0));
        let stop = StopSignal::new();

        let player = {
            let unit = unit.clone();
            let stop = stop.clone();
            thread::spawn(move || unit.play(&stop))
        };
        thread::sleep(Duration::from_millis(30));

        assert!(unit.force_stop());
        assert!(!unit.force_stop());
        assert!(!unit.stop());
        stop.request_stop();
        player.join().unwrap();

        assert_eq!(finished_count(&h.events), 1);
        assert_eq!(h.stats.len(), 1);
    }

    #[test]
    fn test_force_stop_ends_timed_play() {
        let h = harness(FakeLauncher::default());
        let unit = unit(&h, image_spec("m1", 60.0));
        let (done_tx, done_rx) = std::sync::mpsc::channel();

        let player = {
            let unit = unit.clone();
            thread::spawn(move || {
                unit.play(&StopSignal::new());
                let _ = done_tx.send(());
            })
        };
        thread::sleep(Duration::from_millis(30));

        assert!(unit.force_stop());
        assert!(done_rx.recv_timeout(Duration::from_secs(2)).is_ok());
        player.join().unwrap();
        assert!(h.ctx.active.is_empty());
        assert_eq!(finished_count(&h.events), 1);
    }

    #[test]
    fn test_out_of_range_duration_uses_default() {
        let h = harness(FakeLauncher::default());
        let unit = unit(&h, image_spec("m1", 1e20));

        let started = Instant::now();
        unit.play(&StopSignal::new());

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(unit.is_finished());
        assert!(h.ctx.active.is_empty());
        assert_eq!(finished_count(&h.events), 1);
    }

    #[test]
    fn test_stop_before_start_records_no_stat() {
        let h = harness(FakeLauncher::default());
        let unit = unit(&h, image_spec("m1", 1.0));

        assert!(unit.stop());
        assert_eq!(unit.state(), MediaState::Finished);
        assert_eq!(finished_count(&h.events), 1);
        assert!(h.stats.is_empty());

        // a finished unit never plays again
        unit.play(&StopSignal::new());
        assert!(h.renderer.history().is_empty());
    }

    #[test]
    fn test_duplicate_active_key_is_noop() {
        let h = harness(FakeLauncher::default());
        let unit = unit(&h, image_spec("m1", 0.01));
        h.ctx.active.add(unit.key());

        unit.play(&StopSignal::new());
        assert!(h.renderer.history().is_empty());
        assert_eq!(unit.state(), MediaState::Created);
    }

    #[test]
    fn test_missing_uri_finishes_without_stat() {
        let h = harness(FakeLauncher::default());
        let mut spec = image_spec("m1", 1.0);
        spec.options = HashMap::new();
        let unit = unit(&h, spec);

        unit.play(&StopSignal::new());
        assert!(unit.is_finished());
        assert!(h.stats.is_empty());
        assert_eq!(finished_count(&h.events), 1);
    }

    #[test]
    fn test_web_sources() {
        let h = harness(FakeLauncher::default());

        let mut native = image_spec("m2", 0.01);
        native.kind = MediaKind::Web;
        native.raw_type = "webpage".to_string();
        native.render = "native".to_string();
        native
            .options
            .insert("uri".to_string(), "http%3A%2F%2Fexample.com%2F".to_string());
        unit(&h, native).play(&StopSignal::new());

        let mut widget = image_spec("m3", 0.01);
        widget.kind = MediaKind::Web;
        widget.raw_type = "text".to_string();
        unit(&h, widget).play(&StopSignal::new());

        let history = h.renderer.history();
        assert_eq!(history[0].content, ViewContent::Url("http://example.com/".to_string()));
        assert_eq!(
            history[1].content,
            ViewContent::Page(h.ctx.config.save_dir.join("1_r1_m3.html"))
        );
    }

    #[test]
    fn test_video_uses_reported_length() {
        let h = harness(FakeLauncher::scripted(&["ID_LENGTH=0.05", "Starting playback..."]));
        let unit = unit(&h, video_spec("m4", 0.0));

        let started = Instant::now();
        unit.play(&StopSignal::new());

        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(unit.is_finished());
        assert_eq!(h.launcher.commands(), vec!["quit".to_string()]);
        assert_eq!(h.stats.len(), 1);
        assert_eq!(finished_count(&h.events), 1);
        assert!(!h.launcher.spawned()[0].mute);
    }

    #[test]
    fn test_configured_duration_wins() {
        let h = harness(FakeLauncher::scripted(&["ID_LENGTH=30", "Starting playback..."]));
        let unit = unit(&h, video_spec("m4", 0.05));

        let started = Instant::now();
        unit.play(&StopSignal::new());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(h.stats.len(), 1);
    }

    #[test]
    fn test_huge_reported_length_plays_until_stopped() {
        let h = harness(FakeLauncher::scripted(&["ID_LENGTH=1e20", "Starting playback..."]));
        let unit = unit(&h, video_spec("m4", 0.0));
        let stop = StopSignal::new();

        let player = {
            let unit = unit.clone();
            let stop = stop.clone();
            thread::spawn(move || unit.play(&stop))
        };
        thread::sleep(Duration::from_millis(50));
        assert_eq!(unit.state(), MediaState::Playing);

        stop.request_stop();
        player.join().unwrap();
        assert!(unit.is_finished());
        assert_eq!(h.stats.len(), 1);
        assert_eq!(finished_count(&h.events), 1);
    }

    #[test]
    fn test_video_start_watchdog() {
        let h = harness(FakeLauncher::scripted(&["ID_LENGTH=10"]));
        let unit = unit(&h, video_spec("m4", 0.0));

        unit.play(&StopSignal::new());
        assert!(unit.is_finished());
        assert!(h.launcher.killed());
        assert!(h.stats.is_empty());
        assert_eq!(finished_count(&h.events), 1);
    }

    #[test]
    fn test_player_exit_finishes_unit() {
        let h = harness(FakeLauncher::scripted(&["Starting playback..."]).exit_after_script());
        let unit = unit(&h, video_spec("m4", 30.0));

        unit.play(&StopSignal::new());
        assert!(unit.is_finished());
        assert_eq!(h.stats.len(), 1);
        assert_eq!(finished_count(&h.events), 1);
    }

    #[test]
    fn test_spawn_failure_finishes_unit() {
        let h = harness(FakeLauncher::failing());
        let unit = unit(&h, video_spec("m4", 1.0));

        unit.play(&StopSignal::new());
        assert!(unit.is_finished());
        assert!(h.stats.is_empty());
        assert_eq!(h.renderer.open_views(), 0);
    }
}
