//! Cooperative stop and wake-up signalling for long-lived loops
//!
//! Loops park on [`StopSignal::wait_timeout`] instead of sleeping so that a
//! stop request or an early wake is observed promptly.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Longest single condvar park; stop flags are re-checked at least this often
pub const STOP_GRANULARITY: Duration = Duration::from_millis(250);

/// Why a wait returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The full timeout elapsed
    TimedOut,
    /// [`StopSignal::wake`] was called
    Woken,
    /// [`StopSignal::request_stop`] was called
    Stopped,
}

#[derive(Debug, Default)]
struct SignalState {
    stopped: bool,
    woken: bool,
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<SignalState>,
    cond: Condvar,
}

/// Shared stop flag with an interruptible wait
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<Inner>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop; every current and future wait returns immediately
    pub fn request_stop(&self) {
        self.inner.state.lock().stopped = true;
        self.inner.cond.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.state.lock().stopped
    }

    /// End the current (or next) wait early without stopping
    pub fn wake(&self) {
        self.inner.state.lock().woken = true;
        self.inner.cond.notify_all();
    }

    /// Park for up to `timeout`
    ///
    /// A pending wake is consumed by the wait that observes it.
    pub fn wait_timeout(&self, timeout: Duration) -> WaitOutcome {
        // `None` waits until stopped or woken
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.inner.state.lock();

        loop {
            if state.stopped {
                return WaitOutcome::Stopped;
            }
            if state.woken {
                state.woken = false;
                return WaitOutcome::Woken;
            }

            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return WaitOutcome::TimedOut;
                    }
                    (deadline - now).min(STOP_GRANULARITY)
                }
                None => STOP_GRANULARITY,
            };
            self.inner.cond.wait_for(&mut state, slice);
        }
    }
}
