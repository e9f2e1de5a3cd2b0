//! Publish/subscribe transport seam
//!
//! The listener only needs two things from a transport: a way to (re)connect
//! with a set of topic subscriptions and a way to pull the next multipart
//! frame. [`ZmtpSubscriber`](crate::zmtp::ZmtpSubscriber) speaks the real wire
//! protocol; [`MemoryTransport`] is an in-process stand-in.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

/// One multipart message, parts in order
pub type Frame = Vec<Vec<u8>>;

#[async_trait]
pub trait PushTransport: Send {
    /// Connect (or reconnect) and subscribe to each topic prefix
    async fn connect(&mut self, topics: &[String]) -> Result<()>;

    /// Next frame; `Ok(None)` once the publisher is gone for good
    async fn recv(&mut self) -> Result<Option<Frame>>;
}

#[async_trait]
impl PushTransport for Box<dyn PushTransport> {
    async fn connect(&mut self, topics: &[String]) -> Result<()> {
        (**self).connect(topics).await
    }

    async fn recv(&mut self) -> Result<Option<Frame>> {
        (**self).recv().await
    }
}

/// In-process transport fed by a [`MemoryPublisher`]
#[derive(Debug)]
pub struct MemoryTransport {
    rx: mpsc::UnboundedReceiver<Frame>,
    topics: Vec<Vec<u8>>,
}

/// Sending half of a [`MemoryTransport`]
#[derive(Debug, Clone)]
pub struct MemoryPublisher {
    tx: mpsc::UnboundedSender<Frame>,
}

impl MemoryTransport {
    pub fn pair() -> (MemoryPublisher, MemoryTransport) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            MemoryPublisher { tx },
            MemoryTransport {
                rx,
                topics: Vec::new(),
            },
        )
    }

    fn subscribed(&self, frame: &Frame) -> bool {
        let first = frame.first().map(Vec::as_slice).unwrap_or_default();
        self.topics.iter().any(|topic| first.starts_with(topic))
    }
}

impl MemoryPublisher {
    /// Publish a frame; false once the transport has been dropped
    pub fn publish<P: AsRef<[u8]>>(&self, parts: &[P]) -> bool {
        let frame = parts.iter().map(|p| p.as_ref().to_vec()).collect();
        self.tx.send(frame).is_ok()
    }
}

#[async_trait]
impl PushTransport for MemoryTransport {
    async fn connect(&mut self, topics: &[String]) -> Result<()> {
        self.topics = topics.iter().map(|t| t.as_bytes().to_vec()).collect();
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Frame>> {
        // Subscription filtering happens on the subscriber side, as with SUB sockets
        while let Some(frame) = self.rx.recv().await {
            if self.subscribed(&frame) {
                return Ok(Some(frame));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_transport_filters_topics() {
        let (publisher, mut transport) = MemoryTransport::pair();
        transport.connect(&["H".to_string()]).await.unwrap();

        assert!(publisher.publish(&["other", "", ""]));
        assert!(publisher.publish(&["H", "", ""]));
        drop(publisher);

        let frame = transport.recv().await.unwrap().unwrap();
        assert_eq!(frame[0], b"H");
        assert!(transport.recv().await.unwrap().is_none());
    }
}
