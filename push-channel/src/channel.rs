//! Push listener
//!
//! Runs a [`PushTransport`] on a dedicated thread with its own current-thread
//! tokio runtime, so the rest of the display can stay synchronous. Frames for
//! the heartbeat topic or the display's channel are decrypted and handed to a
//! callback; everything else is dropped.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::oneshot;

use crate::crypto::{new_channel_name, PushKeys, DEFAULT_KEY_BITS};
use crate::error::{PushError, Result};
use crate::transport::{Frame, PushTransport};

/// Topic every display subscribes to for liveness
pub const HEARTBEAT_TOPIC: &str = "H";

/// Delay before reconnecting a failed transport
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// A decrypted push message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    /// Topic the frame arrived on
    pub topic: String,
    pub payload: Vec<u8>,
}

impl PushMessage {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// What a single frame turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    Heartbeat,
    Message(PushMessage),
    /// Wrong shape or topic; dropped silently
    Ignored,
}

type Handler = Arc<dyn Fn(PushMessage) + Send + Sync>;

/// Key material and channel identity of one display
#[derive(Debug, Clone)]
pub struct PushChannel {
    keys: Arc<PushKeys>,
    channel: String,
    reconnect_delay: Duration,
}

impl PushChannel {
    /// Generate keys and a channel name for the publisher at `push_url`
    pub fn new(push_url: &str) -> Result<Self> {
        let keys = PushKeys::generate(DEFAULT_KEY_BITS)?;
        Ok(Self::with_keys(keys, new_channel_name(push_url)))
    }

    pub fn with_keys(keys: PushKeys, channel: impl Into<String>) -> Self {
        Self {
            keys: Arc::new(keys),
            channel: channel.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Channel name to announce on registration
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// PEM public key to announce on registration
    pub fn public_key_pem(&self) -> &str {
        self.keys.public_key_pem()
    }

    pub fn keys(&self) -> &PushKeys {
        &self.keys
    }

    fn topics(&self) -> Vec<String> {
        vec![HEARTBEAT_TOPIC.to_string(), self.channel.clone()]
    }

    /// Classify and, when needed, decrypt one frame.
    ///
    /// Only 3-part frames whose first part is the heartbeat topic or this
    /// display's channel are considered.
    pub fn open_frame(&self, frame: &Frame) -> Result<FrameOutcome> {
        let [topic, env_key, sealed] = frame.as_slice() else {
            return Ok(FrameOutcome::Ignored);
        };
        let topic = String::from_utf8_lossy(topic);
        if topic != HEARTBEAT_TOPIC && topic != self.channel {
            return Ok(FrameOutcome::Ignored);
        }
        if env_key.is_empty() {
            return Ok(FrameOutcome::Heartbeat);
        }
        if sealed.is_empty() {
            return Err(PushError::Format("message without payload".to_string()));
        }

        let payload = self.keys.open_encoded(env_key, sealed)?;
        Ok(FrameOutcome::Message(PushMessage {
            topic: topic.into_owned(),
            payload,
        }))
    }

    /// Listen on a background thread until the handle is stopped
    pub fn start<T, F>(self, transport: T, handler: F) -> Result<PushHandle>
    where
        T: PushTransport + 'static,
        F: Fn(PushMessage) + Send + Sync + 'static,
    {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handler: Handler = Arc::new(handler);

        let thread = thread::Builder::new()
            .name("xibo-push".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        tracing::error!("Failed to build push runtime: {}", e);
                        return;
                    }
                };
                runtime.block_on(self.listen(transport, handler, shutdown_rx));
            })
            .map_err(|e| PushError::Transport(format!("failed to spawn push thread: {}", e)))?;

        Ok(PushHandle {
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    async fn listen<T: PushTransport>(
        self,
        mut transport: T,
        handler: Handler,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        let topics = self.topics();
        tracing::info!(channel = %self.channel, "push listener started");

        'outer: loop {
            tokio::select! {
                _ = &mut shutdown => break 'outer,
                connected = transport.connect(&topics) => {
                    if let Err(e) = connected {
                        tracing::warn!("Push transport connect failed: {}", e);
                        tokio::select! {
                            _ = &mut shutdown => break 'outer,
                            _ = tokio::time::sleep(self.reconnect_delay) => continue 'outer,
                        }
                    }
                }
            }

            loop {
                tokio::select! {
                    _ = &mut shutdown => break 'outer,
                    received = transport.recv() => match received {
                        Ok(Some(frame)) => self.dispatch(&frame, &handler),
                        Ok(None) => {
                            tracing::info!("push publisher closed");
                            break 'outer;
                        }
                        Err(e) => {
                            tracing::warn!("Push transport failed, reconnecting: {}", e);
                            tokio::select! {
                                _ = &mut shutdown => break 'outer,
                                _ = tokio::time::sleep(self.reconnect_delay) => continue 'outer,
                            }
                        }
                    }
                }
            }
        }

        tracing::info!("push listener stopped");
    }

    fn dispatch(&self, frame: &Frame, handler: &Handler) {
        match self.open_frame(frame) {
            Ok(FrameOutcome::Heartbeat) => tracing::trace!("push heartbeat"),
            Ok(FrameOutcome::Ignored) => tracing::trace!(parts = frame.len(), "push frame ignored"),
            Ok(FrameOutcome::Message(message)) => {
                tracing::info!(topic = %message.topic, message = %message.text(), "push message received");
                handler(message);
            }
            Err(e) => tracing::warn!("Dropping push message: {}", e),
        }
    }
}

/// Control handle for a running listener
#[derive(Debug)]
pub struct PushHandle {
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl PushHandle {
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Signal the listener and wait for its thread
    pub fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("push thread panicked");
            }
        }
    }
}

impl Drop for PushHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{seal, tests::test_keys};
    use crate::transport::MemoryTransport;
    use base64::Engine;
    use std::sync::mpsc;

    fn channel() -> PushChannel {
        PushChannel::with_keys(test_keys().clone(), "abc123")
            .with_reconnect_delay(Duration::from_millis(10))
    }

    fn sealed_frame(topic: &str, plain: &[u8], channel: &PushChannel) -> Frame {
        let (sealed, env_key) = seal(plain, channel.keys().public_key()).unwrap();
        let engine = base64::engine::general_purpose::STANDARD;
        vec![
            topic.as_bytes().to_vec(),
            engine.encode(env_key).into_bytes(),
            engine.encode(sealed).into_bytes(),
        ]
    }

    #[test]
    fn test_heartbeat_frame() {
        let ch = channel();
        let frame = vec![b"H".to_vec(), Vec::new(), Vec::new()];
        assert_eq!(ch.open_frame(&frame).unwrap(), FrameOutcome::Heartbeat);
    }

    #[test]
    fn test_foreign_topic_and_shape_ignored() {
        let ch = channel();
        let other = vec![b"zzz".to_vec(), b"a".to_vec(), b"b".to_vec()];
        let short = vec![b"abc123".to_vec(), b"a".to_vec()];
        assert_eq!(ch.open_frame(&other).unwrap(), FrameOutcome::Ignored);
        assert_eq!(ch.open_frame(&short).unwrap(), FrameOutcome::Ignored);
    }

    #[test]
    fn test_channel_message_decrypted() {
        let ch = channel();
        let frame = sealed_frame("abc123", b"collectNow", &ch);
        match ch.open_frame(&frame).unwrap() {
            FrameOutcome::Message(message) => {
                assert_eq!(message.topic, "abc123");
                assert_eq!(message.text(), "collectNow");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_garbage_payload_is_error() {
        let ch = channel();
        let frame = vec![b"abc123".to_vec(), b"bm90IGEga2V5".to_vec(), b"AAAA".to_vec()];
        assert!(matches!(ch.open_frame(&frame), Err(PushError::Decrypt(_))));
    }

    #[test]
    fn test_listener_forwards_messages_and_stops() {
        let ch = channel();
        let (publisher, transport) = MemoryTransport::pair();
        let (tx, rx) = mpsc::channel();

        let good = sealed_frame("abc123", b"collectNow", &ch);
        let mut handle = ch
            .clone()
            .start(transport, move |message| {
                let _ = tx.send(message.text());
            })
            .unwrap();

        publisher.publish(&[b"H".as_slice(), b"".as_slice(), b"".as_slice()]);
        publisher.publish(&[b"abc123".as_slice(), b"junk".as_slice(), b"junk".as_slice()]);
        publisher.publish(&good);

        let received = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(received, "collectNow");
        assert!(rx.try_recv().is_err());

        handle.stop();
        assert!(!handle.is_running());
        drop(publisher);
    }

    #[test]
    fn test_closed_publisher_ends_listener() {
        let (publisher, transport) = MemoryTransport::pair();
        drop(publisher);
        let mut handle = channel().start(transport, |_| {}).unwrap();
        handle.stop();
        assert!(!handle.is_running());
    }
}
