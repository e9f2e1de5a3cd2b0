//! Events published by the sync loop

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use xmds_api::{EntryKind, ManifestEntry};

use crate::resolver::LayoutSelection;
use crate::shutdown::StopSignal;

/// Something the sync loop did that the player may care about
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// The schedule was resolved; see [`SelectionTicket`]
    LayoutSelected {
        selection: LayoutSelection,
        ticket: SelectionTicket,
    },
    /// A file transfer is about to start
    FileDownloading { kind: EntryKind, path: PathBuf },
    /// A file was written and verified
    FileDownloaded(ManifestEntry),
}

/// Handoff token carried by [`SyncEvent::LayoutSelected`]
///
/// The sync loop does not move on until every copy of the ticket has been
/// dropped or acknowledged, so a receiver that owns the selection finishes
/// applying it before the next one is produced.
#[derive(Debug, Clone)]
pub struct SelectionTicket {
    _guard: Sender<()>,
}

impl SelectionTicket {
    /// A ticket no sync loop is waiting on, for selections made elsewhere
    pub fn detached() -> Self {
        let (tx, _rx) = channel::bounded(0);
        Self { _guard: tx }
    }

    /// Release the ticket
    pub fn acknowledge(self) {}
}

/// Issuer side of a [`SelectionTicket`]
#[derive(Debug)]
pub(crate) struct Handoff {
    ticket: SelectionTicket,
    released: Receiver<()>,
}

/// How a handoff ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandoffOutcome {
    Released,
    TimedOut,
    Stopped,
}

impl Handoff {
    pub(crate) fn new() -> Self {
        let (tx, rx) = channel::bounded(0);
        Self {
            ticket: SelectionTicket { _guard: tx },
            released: rx,
        }
    }

    pub(crate) fn ticket(&self) -> SelectionTicket {
        self.ticket.clone()
    }

    /// Drop the issuer's copy and wait for all others to be released
    pub(crate) fn wait(self, timeout: Duration, poll: Duration, stop: &StopSignal) -> HandoffOutcome {
        let Handoff { ticket, released } = self;
        drop(ticket);

        let deadline = Instant::now() + timeout;
        loop {
            match released.recv_timeout(poll) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return HandoffOutcome::Released,
                Err(RecvTimeoutError::Timeout) => {
                    if stop.is_stopped() {
                        return HandoffOutcome::Stopped;
                    }
                    if Instant::now() >= deadline {
                        return HandoffOutcome::TimedOut;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const POLL: Duration = Duration::from_millis(10);

    #[test]
    fn test_unclaimed_ticket_releases_immediately() {
        let handoff = Handoff::new();
        let outcome = handoff.wait(Duration::from_secs(5), POLL, &StopSignal::new());
        assert_eq!(outcome, HandoffOutcome::Released);
    }

    #[test]
    fn test_waits_for_acknowledge() {
        let handoff = Handoff::new();
        let ticket = handoff.ticket();

        let holder = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            ticket.acknowledge();
        });

        let started = Instant::now();
        let outcome = handoff.wait(Duration::from_secs(5), POLL, &StopSignal::new());
        assert_eq!(outcome, HandoffOutcome::Released);
        assert!(started.elapsed() >= Duration::from_millis(40));
        holder.join().unwrap();
    }

    #[test]
    fn test_held_ticket_times_out() {
        let handoff = Handoff::new();
        let _held = handoff.ticket();
        let outcome = handoff.wait(Duration::from_millis(30), POLL, &StopSignal::new());
        assert_eq!(outcome, HandoffOutcome::TimedOut);
    }

    #[test]
    fn test_stop_ends_wait() {
        let stop = StopSignal::new();
        stop.request_stop();
        let handoff = Handoff::new();
        let _held = handoff.ticket();
        assert_eq!(handoff.wait(Duration::from_secs(5), POLL, &stop), HandoffOutcome::Stopped);
    }
}
