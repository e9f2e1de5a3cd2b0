//! Schedule resolution
//!
//! Picks the layout that should be on screen for a given instant. Schedule
//! times are CMS-local wall-clock strings; [`TimeFormat`] converts them to
//! epoch seconds using a fixed offset.

use std::fmt::Write;

use chrono::{DateTime, NaiveDateTime};
use xmds_api::Schedule;

/// Default strftime pattern of CMS timestamps
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Default CMS timezone offset in seconds
pub const DEFAULT_TZ_OFFSET: i64 = 25200;

/// Conversion between CMS time strings and epoch seconds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeFormat {
    /// strftime pattern, e.g. `%Y-%m-%d %H:%M:%S`
    pub format: String,
    /// Seconds the CMS clock is ahead of UTC
    pub tz_offset: i64,
}

impl Default for TimeFormat {
    fn default() -> Self {
        Self {
            format: DEFAULT_TIME_FORMAT.to_string(),
            tz_offset: DEFAULT_TZ_OFFSET,
        }
    }
}

impl TimeFormat {
    pub fn new(format: impl Into<String>, tz_offset: i64) -> Self {
        Self {
            format: format.into(),
            tz_offset,
        }
    }

    /// Parse a CMS time string to epoch seconds
    pub fn parse_epoch(&self, text: &str) -> Option<i64> {
        let naive = NaiveDateTime::parse_from_str(text.trim(), &self.format).ok()?;
        Some(naive.and_utc().timestamp() - self.tz_offset)
    }

    /// Render epoch seconds as a CMS time string
    pub fn format_epoch(&self, epoch: i64) -> Option<String> {
        let dt = DateTime::from_timestamp(epoch + self.tz_offset, 0)?;
        let mut out = String::new();
        write!(out, "{}", dt.naive_utc().format(&self.format)).ok()?;
        Some(out)
    }
}

/// The layout chosen for the current instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutSelection {
    pub layout_id: String,
    /// `None` when the default layout was chosen
    pub schedule_id: Option<String>,
    /// `(from_epoch, to_epoch)`; `(0, 0)` for the default layout
    pub window: (i64, i64),
}

impl LayoutSelection {
    pub fn default_layout(layout_id: impl Into<String>) -> Self {
        Self {
            layout_id: layout_id.into(),
            schedule_id: None,
            window: (0, 0),
        }
    }

    pub fn is_default(&self) -> bool {
        self.schedule_id.is_none()
    }

    /// Epoch at which the selection stops being valid, if it is windowed
    pub fn expires_at(&self) -> Option<i64> {
        match self.window {
            (0, 0) => None,
            (_, to) => Some(to),
        }
    }
}

/// Select the active layout at `now`.
///
/// The first entry in document order whose window contains `now` (both ends
/// inclusive) wins; priority is not consulted. Entries whose times do not
/// parse are skipped. Without a match the declared default layout is chosen.
pub fn resolve(schedule: &Schedule, now: i64, format: &TimeFormat) -> Option<LayoutSelection> {
    for entry in &schedule.entries {
        if entry.layout_file.is_empty() {
            continue;
        }

        let (from, to) = match (format.parse_epoch(&entry.from), format.parse_epoch(&entry.to)) {
            (Some(from), Some(to)) => (from, to),
            _ => {
                tracing::debug!(
                    layout = %entry.layout_file,
                    from = %entry.from,
                    to = %entry.to,
                    "skipping schedule entry with unparseable window"
                );
                continue;
            }
        };

        if from <= now && now <= to {
            return Some(LayoutSelection {
                layout_id: entry.layout_file.clone(),
                schedule_id: Some(entry.schedule_id.clone()),
                window: (from, to),
            });
        }
    }

    schedule
        .default_layout
        .as_ref()
        .map(LayoutSelection::default_layout)
}
