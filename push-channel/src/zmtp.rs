//! Minimal ZMTP 3.0 subscriber
//!
//! Enough of the ZeroMQ wire protocol to act as a SUB socket against the
//! CMS push publisher: NULL security, one peer, prefix subscriptions sent as
//! 3.0-style subscription messages, multipart frames in.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{PushError, Result};
use crate::transport::{Frame, PushTransport};

const GREETING_LEN: usize = 64;
const MECHANISM_NULL: &[u8] = b"NULL";

const FLAG_MORE: u8 = 0x01;
const FLAG_LONG: u8 = 0x02;
const FLAG_COMMAND: u8 = 0x04;

/// Largest frame accepted from a peer
pub const MAX_FRAME_LEN: u64 = 16 * 1024 * 1024;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

fn greeting() -> [u8; GREETING_LEN] {
    let mut g = [0u8; GREETING_LEN];
    g[0] = 0xFF;
    g[9] = 0x7F;
    g[10] = 3;
    g[11] = 0;
    g[12..12 + MECHANISM_NULL.len()].copy_from_slice(MECHANISM_NULL);
    // as-server and filler stay zero
    g
}

fn check_greeting(peer: &[u8; GREETING_LEN]) -> Result<()> {
    if peer[0] != 0xFF || peer[9] != 0x7F {
        return Err(PushError::Format("peer is not a ZMTP endpoint".to_string()));
    }
    if peer[10] < 3 {
        return Err(PushError::Format(format!(
            "unsupported ZMTP version {}.{}",
            peer[10], peer[11]
        )));
    }
    let mechanism = &peer[12..32];
    let name_end = mechanism.iter().position(|b| *b == 0).unwrap_or(mechanism.len());
    if &mechanism[..name_end] != MECHANISM_NULL {
        return Err(PushError::Format(format!(
            "unsupported security mechanism {}",
            String::from_utf8_lossy(&mechanism[..name_end])
        )));
    }
    Ok(())
}

fn ready_command(socket_type: &str) -> Vec<u8> {
    let mut body = Vec::with_capacity(32);
    body.push(5);
    body.extend_from_slice(b"READY");
    let name = b"Socket-Type";
    body.push(name.len() as u8);
    body.extend_from_slice(name);
    body.extend_from_slice(&(socket_type.len() as u32).to_be_bytes());
    body.extend_from_slice(socket_type.as_bytes());
    body
}

/// One established ZMTP connection
#[derive(Debug)]
pub struct Session<S> {
    stream: S,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Exchange greetings and READY commands
    pub async fn open(mut stream: S, socket_type: &str) -> Result<Self> {
        stream.write_all(&greeting()).await?;
        stream.flush().await?;

        let mut peer = [0u8; GREETING_LEN];
        stream.read_exact(&mut peer).await?;
        check_greeting(&peer)?;

        let mut session = Self { stream };
        session
            .write_frame(FLAG_COMMAND, &ready_command(socket_type))
            .await?;
        session.stream.flush().await?;

        let (flags, body) = session.read_frame().await?;
        if flags & FLAG_COMMAND == 0 || !body.starts_with(b"\x05READY") {
            return Err(PushError::Format("expected READY from peer".to_string()));
        }
        Ok(session)
    }

    async fn write_frame(&mut self, flags: u8, body: &[u8]) -> Result<()> {
        let mut header = Vec::with_capacity(9);
        if body.len() > u8::MAX as usize {
            header.push(flags | FLAG_LONG);
            header.extend_from_slice(&(body.len() as u64).to_be_bytes());
        } else {
            header.push(flags);
            header.push(body.len() as u8);
        }
        self.stream.write_all(&header).await?;
        self.stream.write_all(body).await?;
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<(u8, Vec<u8>)> {
        let flags = self.stream.read_u8().await?;
        let len = if flags & FLAG_LONG != 0 {
            self.stream.read_u64().await?
        } else {
            u64::from(self.stream.read_u8().await?)
        };
        if len > MAX_FRAME_LEN {
            return Err(PushError::Format(format!("frame of {} bytes refused", len)));
        }

        let mut body = vec![0u8; len as usize];
        self.stream.read_exact(&mut body).await?;
        Ok((flags, body))
    }

    /// Register a topic prefix with the publisher
    pub async fn subscribe(&mut self, topic: &[u8]) -> Result<()> {
        let mut body = Vec::with_capacity(topic.len() + 1);
        body.push(0x01);
        body.extend_from_slice(topic);
        self.write_message(&[body.as_slice()]).await
    }

    pub async fn write_message(&mut self, parts: &[&[u8]]) -> Result<()> {
        for (i, part) in parts.iter().enumerate() {
            let more = if i + 1 < parts.len() { FLAG_MORE } else { 0 };
            self.write_frame(more, part).await?;
        }
        self.stream.flush().await?;
        Ok(())
    }

    /// Read one multipart message, skipping interleaved commands
    pub async fn read_message(&mut self) -> Result<Frame> {
        let mut parts = Vec::new();
        loop {
            let (flags, body) = self.read_frame().await?;
            if flags & FLAG_COMMAND != 0 {
                tracing::trace!(len = body.len(), "ignoring ZMTP command");
                continue;
            }
            parts.push(body);
            if flags & FLAG_MORE == 0 {
                return Ok(parts);
            }
        }
    }
}

/// [`PushTransport`] over a TCP ZMTP connection
#[derive(Debug)]
pub struct ZmtpSubscriber {
    endpoint: String,
    connect_timeout: Duration,
    session: Option<Session<TcpStream>>,
}

impl ZmtpSubscriber {
    /// `endpoint` is a `tcp://host:port` URL as configured on the CMS
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            session: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn address(&self) -> Result<&str> {
        let address = self.endpoint.strip_prefix("tcp://").ok_or_else(|| {
            PushError::Transport(format!("unsupported push endpoint {}", self.endpoint))
        })?;
        Ok(address.trim_end_matches('/'))
    }
}

#[async_trait]
impl PushTransport for ZmtpSubscriber {
    async fn connect(&mut self, topics: &[String]) -> Result<()> {
        self.session = None;
        let address = self.address()?.to_string();

        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| PushError::Transport(format!("connect to {} timed out", address)))??;
        let _ = stream.set_nodelay(true);

        let mut session = Session::open(stream, "SUB").await?;
        for topic in topics {
            session.subscribe(topic.as_bytes()).await?;
        }

        tracing::debug!(endpoint = %self.endpoint, topics = topics.len(), "push transport connected");
        self.session = Some(session);
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Frame>> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| PushError::Transport("not connected".to_string()))?;

        match session.read_message().await {
            Ok(frame) => Ok(Some(frame)),
            Err(e) => {
                self.session = None;
                Err(e)
            }
        }
    }
}
