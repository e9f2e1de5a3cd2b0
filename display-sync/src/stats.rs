//! Proof-of-play statistics
//!
//! Finished media append to a shared [`StatsQueue`]; the coordinator flushes
//! it once per cycle. Entries leave the queue only after the CMS confirms
//! receipt, so delivery is at-least-once.

use std::sync::Arc;

use parking_lot::Mutex;
use xmds_api::{RemoteService, StatRecord, StatsBatch};

use crate::error::{Result, SyncError};
use crate::resolver::TimeFormat;

/// One completed play
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackStat {
    /// Stat type reported to the CMS, normally `media`
    pub kind: String,
    pub start_epoch: i64,
    pub finish_epoch: i64,
    pub schedule_id: Option<String>,
    pub layout_id: String,
    pub media_id: String,
}

impl PlaybackStat {
    fn to_record(&self, format: &TimeFormat) -> StatRecord {
        let render = |epoch: i64| format.format_epoch(epoch).unwrap_or_else(|| epoch.to_string());
        StatRecord {
            kind: self.kind.clone(),
            from: render(self.start_epoch),
            to: render(self.finish_epoch),
            schedule_id: self.schedule_id.clone().unwrap_or_default(),
            layout_id: self.layout_id.clone(),
            media_id: self.media_id.clone(),
        }
    }
}

/// Pending statistics shared between players and the sync loop
#[derive(Debug, Clone, Default)]
pub struct StatsQueue {
    pending: Arc<Mutex<Vec<PlaybackStat>>>,
}

impl StatsQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, stat: PlaybackStat) {
        self.pending.lock().push(stat);
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Copy of the pending entries, oldest first
    pub fn snapshot(&self) -> Vec<PlaybackStat> {
        self.pending.lock().clone()
    }

    /// Submit everything pending and drop exactly what was submitted on success.
    ///
    /// Entries queued while the call is in flight stay queued. On failure
    /// nothing is removed.
    pub fn flush(&self, service: &dyn RemoteService, format: &TimeFormat) -> Result<usize> {
        let submitted = self.snapshot();
        if submitted.is_empty() {
            return Ok(0);
        }

        let batch = StatsBatch {
            records: submitted.iter().map(|s| s.to_record(format)).collect(),
        };

        if !service.submit_stats(&batch)? {
            return Err(SyncError::Transport("stats batch was not acknowledged".to_string()));
        }

        let mut pending = self.pending.lock();
        let count = submitted.len().min(pending.len());
        pending.drain(..count);
        tracing::debug!(submitted = count, remaining = pending.len(), "stats flushed");
        Ok(count)
    }
}
