//! Wiring of the sync loop, the sequencer and the push listener

use std::sync::Arc;

use crossbeam::channel::Receiver;
use display_player::{
    EventBus, HeadlessRenderer, MplayerLauncher, PlaybackEvent, PlaybackHandle, PlaybackSequencer,
    ProcessLauncher, Renderer,
};
use display_sync::{ContentSyncCoordinator, CoordinatorHandle, StopSignal, SyncState};
use push_channel::{PushChannel, PushHandle, PushTransport, ZmtpSubscriber};
use xmds_api::{DisplayIdentity, RegisterDisplayRequest, RemoteService, XmdsClient};

use crate::config::DisplayConfig;
use crate::error::{DisplayError, Result};

/// A display ready to start
///
/// Collaborators default to the XMDS client, a headless renderer and
/// mplayer; each can be swapped before [`DisplayClient::start`].
pub struct DisplayClient {
    config: DisplayConfig,
    identity: DisplayIdentity,
    service: Arc<dyn RemoteService>,
    renderer: Arc<dyn Renderer>,
    launcher: Arc<dyn ProcessLauncher>,
    push_channel: Option<PushChannel>,
    push_transport: Option<Box<dyn PushTransport>>,
}

impl DisplayClient {
    /// Detect the display identity and talk to the CMS named in `config`
    pub fn new(config: DisplayConfig) -> Result<Self> {
        let identity = DisplayIdentity::detect(config.server_key.clone())?;
        let service = Arc::new(XmdsClient::new(&config.url, identity.clone()));
        Ok(Self::with_service(config, identity, service))
    }

    pub fn with_service(
        config: DisplayConfig,
        identity: DisplayIdentity,
        service: Arc<dyn RemoteService>,
    ) -> Self {
        Self {
            config,
            identity,
            service,
            renderer: Arc::new(HeadlessRenderer::new()),
            launcher: Arc::new(MplayerLauncher::default()),
            push_channel: None,
            push_transport: None,
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn ProcessLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Use existing key material; enables push even without `xmrPubUrl`
    pub fn with_push_channel(mut self, channel: PushChannel) -> Self {
        self.push_channel = Some(channel);
        self
    }

    /// Use this transport instead of connecting to `xmrPubUrl` over ZMTP
    pub fn with_push_transport(mut self, transport: Box<dyn PushTransport>) -> Self {
        self.push_transport = Some(transport);
        self
    }

    pub fn config(&self) -> &DisplayConfig {
        &self.config
    }

    pub fn identity(&self) -> &DisplayIdentity {
        &self.identity
    }

    fn registration(&self, push: Option<&PushChannel>) -> RegisterDisplayRequest {
        RegisterDisplayRequest {
            display_name: self.config.display_name.clone(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            operating_system: std::env::consts::OS.to_string(),
            mac_address: self.identity.mac_address.clone(),
            xmr_channel: push.map(|p| p.channel().to_string()).unwrap_or_default(),
            xmr_pub_key: push.map(|p| p.public_key_pem().to_string()).unwrap_or_default(),
            ..RegisterDisplayRequest::default()
        }
    }

    /// Start every loop; the returned handle stops them again
    pub fn start(mut self) -> Result<RunningDisplay> {
        let push = match (self.push_channel.take(), &self.config.xmr_pub_url) {
            (Some(channel), _) => Some(channel),
            (None, Some(url)) if self.config.push_enabled() => Some(PushChannel::new(url.trim())?),
            _ => None,
        };
        let push_transport: Option<Box<dyn PushTransport>> = match (&push, self.push_transport.take()) {
            (None, _) => None,
            (Some(_), Some(transport)) => Some(transport),
            (Some(_), None) => match &self.config.xmr_pub_url {
                Some(url) => Some(Box::new(ZmtpSubscriber::new(url.trim()))),
                None => {
                    return Err(DisplayError::Config(
                        "push channel given without a transport or xmrPubUrl".to_string(),
                    ))
                }
            },
        };

        let registration = self.registration(push.as_ref());
        let mut coordinator = ContentSyncCoordinator::new(
            Arc::clone(&self.service),
            self.config.sync_config(),
            registration,
        )?;
        let sync_events = coordinator.subscribe();
        let wake = coordinator.stop_signal();

        let mut sequencer = PlaybackSequencer::new(
            self.config.player_config(),
            Arc::clone(&self.renderer),
            Arc::clone(&self.launcher),
            coordinator.stats_queue(),
        );
        let expiry_wake = wake.clone();
        sequencer.on_resync(move || expiry_wake.wake());
        let playback_events = sequencer.events();

        let playback = sequencer.start(sync_events);
        let sync = coordinator.start();

        let push = match (push, push_transport) {
            (Some(channel), Some(transport)) => {
                let push_wake = wake.clone();
                Some(channel.start(transport, move |_message| push_wake.wake())?)
            }
            _ => None,
        };

        tracing::info!(
            hardware_key = %self.identity.hardware_key,
            push = push.is_some(),
            "display started"
        );

        Ok(RunningDisplay {
            sync,
            playback,
            push,
            wake,
            playback_events,
            stopped: false,
        })
    }
}

/// Handles of a started display
#[derive(Debug)]
pub struct RunningDisplay {
    sync: CoordinatorHandle,
    playback: PlaybackHandle,
    push: Option<PushHandle>,
    wake: StopSignal,
    playback_events: EventBus,
    stopped: bool,
}

impl RunningDisplay {
    /// Start a sync cycle now instead of at the next interval
    pub fn request_sync(&self) {
        self.wake.wake();
    }

    pub fn subscribe_playback(&self) -> Receiver<PlaybackEvent> {
        self.playback_events.subscribe()
    }

    pub fn sync_state(&self) -> SyncState {
        self.sync.state()
    }

    pub fn is_running(&self) -> bool {
        self.sync.is_running() && self.playback.is_running()
    }

    pub fn push_enabled(&self) -> bool {
        self.push.is_some()
    }

    /// Stop push, then sync, then playback, waiting for each
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        if let Some(push) = self.push.as_mut() {
            push.stop();
        }
        self.sync.stop();
        self.playback.stop();
        tracing::info!("display stopped");
    }
}

impl Drop for RunningDisplay {
    fn drop(&mut self) {
        self.stop();
    }
}
