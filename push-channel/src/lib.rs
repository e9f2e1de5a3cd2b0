//! Push channel for xibo-display.
//!
//! The CMS can nudge a display between polls over a publish/subscribe
//! channel. This crate holds the display's side of that conversation:
//!
//! - [`PushKeys`]: the RSA key pair whose public half is announced on
//!   registration, and the sealed-envelope decryption of incoming messages.
//! - [`PushTransport`]: the async transport seam, with a ZMTP subscriber
//!   ([`ZmtpSubscriber`]) and an in-process one ([`MemoryTransport`]).
//! - [`PushChannel`]: the listener thread that filters, decrypts and forwards
//!   messages to a callback until its [`PushHandle`] is stopped.
//!
//! # Example
//!
//! ```no_run
//! use push_channel::{PushChannel, ZmtpSubscriber};
//!
//! let channel = PushChannel::new("tcp://cms.example.com:9505")?;
//! println!("announce channel {} on registration", channel.channel());
//!
//! let transport = ZmtpSubscriber::new("tcp://cms.example.com:9505");
//! let mut handle = channel.start(transport, |message| {
//!     println!("push: {}", message.text());
//! })?;
//!
//! handle.stop();
//! # Ok::<(), push_channel::PushError>(())
//! ```
//!
//! Nothing here is fatal to the display: undecryptable or malformed frames
//! are logged and dropped, and a broken connection is retried.

pub mod channel;
pub mod crypto;
pub mod error;
pub mod transport;
pub mod zmtp;

pub use channel::{FrameOutcome, PushChannel, PushHandle, PushMessage, HEARTBEAT_TOPIC};
pub use crypto::{channel_name, seal, PushKeys, DEFAULT_KEY_BITS};
pub use error::{PushError, Result};
pub use transport::{Frame, MemoryPublisher, MemoryTransport, PushTransport};
pub use zmtp::ZmtpSubscriber;
