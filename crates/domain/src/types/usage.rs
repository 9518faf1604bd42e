//! Usage events and per-day usage records

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::app::AppId;
use crate::impl_wire_name_conversions;

/// Direction of a foreground/background transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Foreground,
    Background,
    /// The app was already in the foreground when observation began: opens a
    /// session without counting a launch.
    Resume,
}

impl_wire_name_conversions!(TransitionKind {
    Foreground => "foreground",
    Background => "background",
    Resume => "resume",
});

/// OS-emitted notification that an app became, or stopped being, the visible
/// app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub app: AppId,
    pub kind: TransitionKind,
    pub at: DateTime<Utc>,
}

impl TransitionEvent {
    pub fn foreground(app: AppId, at: DateTime<Utc>) -> Self {
        Self { app, kind: TransitionKind::Foreground, at }
    }

    pub fn background(app: AppId, at: DateTime<Utc>) -> Self {
        Self { app, kind: TransitionKind::Background, at }
    }

    pub fn resume(app: AppId, at: DateTime<Utc>) -> Self {
        Self { app, kind: TransitionKind::Resume, at }
    }
}

/// Key of a usage record: one record per app per calendar date.
pub type UsageKey = (AppId, NaiveDate);

/// Accumulated usage of one app on one calendar date.
///
/// Records only grow within a day. [`UsageRecord::merge`] is the upsert rule
/// every store applies, which makes re-syncing the same interval harmless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub app: AppId,
    pub date: NaiveDate,
    pub foreground_secs: i64,
    pub launch_count: u32,
    pub last_used: Option<DateTime<Utc>>,
}

impl UsageRecord {
    pub fn empty(app: AppId, date: NaiveDate) -> Self {
        Self { app, date, foreground_secs: 0, launch_count: 0, last_used: None }
    }

    pub fn key(&self) -> UsageKey {
        (self.app.clone(), self.date)
    }

    pub fn foreground_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.foreground_secs)
    }

    /// Monotonic upsert: every field keeps the larger of the two values.
    ///
    /// Returns `true` when the stored record changed.
    pub fn merge(&mut self, incoming: &Self) -> bool {
        debug_assert_eq!(self.key(), incoming.key(), "merging records of different keys");

        let before = self.clone();
        self.foreground_secs = self.foreground_secs.max(incoming.foreground_secs);
        self.launch_count = self.launch_count.max(incoming.launch_count);
        self.last_used = match (self.last_used, incoming.last_used) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        *self != before
    }

    pub(crate) fn touch(&mut self, at: DateTime<Utc>) {
        self.last_used = Some(self.last_used.map_or(at, |prev| prev.max(at)));
    }
}

/// Mutating helpers used by the aggregator.
impl UsageRecord {
    /// Add foreground time and bump the last-used instant.
    pub fn add_foreground(&mut self, secs: i64, ended_at: DateTime<Utc>) {
        self.foreground_secs += secs.max(0);
        self.touch(ended_at);
    }

    /// Count one launch observed at `at`.
    pub fn add_launch(&mut self, at: DateTime<Utc>) {
        self.launch_count = self.launch_count.saturating_add(1);
        self.touch(at);
    }
}
