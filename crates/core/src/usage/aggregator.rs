//! Replays transition events into per-day usage records

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use timeguard_domain::{AppId, TransitionEvent, TransitionKind, UsageRecord};

/// Pure event-to-record aggregation in a given time zone.
///
/// Events are replayed in timestamp order with a per-app "foregrounded since"
/// marker:
///
/// - every foreground transition counts one launch on its local date;
/// - a resume transition opens a session without counting a launch, for apps
///   that were already in the foreground before the window began;
/// - a background transition closes the session and adds its duration, split
///   at each local midnight so every date receives only its own portion.
///   Portions are measured between whole-second floors of their endpoints so
///   they always sum to the session's whole-second length;
/// - a foreground transition for an app that is already open keeps the
///   earliest start;
/// - a background transition without an open session is ignored;
/// - a session still open at the end of the window contributes its launch but
///   no duration.
#[derive(Debug, Clone)]
pub struct UsageAggregator<Tz: TimeZone> {
    tz: Tz,
}

impl<Tz: TimeZone> UsageAggregator<Tz> {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Local calendar date of `at`.
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.tz).date_naive()
    }

    /// First instant of `date` in this time zone.
    ///
    /// When midnight falls into a DST gap the first valid instant of the day is
    /// used instead.
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        let midnight = date.and_time(NaiveTime::MIN);
        (0..=3)
            .find_map(|hours| {
                self.tz.from_local_datetime(&(midnight + Duration::hours(hours))).earliest()
            })
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
    }

    /// Split `[start, end)` at every local midnight.
    pub fn split_by_day(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<(NaiveDate, DateTime<Utc>, DateTime<Utc>)> {
        let mut portions = Vec::new();
        let mut cursor = start;

        while cursor < end {
            let date = self.local_date(cursor);
            let Some(next_date) = date.succ_opt() else {
                portions.push((date, cursor, end));
                break;
            };
            let next_midnight = self.start_of_day(next_date);
            if next_midnight <= cursor {
                portions.push((date, cursor, end));
                break;
            }
            let portion_end = next_midnight.min(end);
            portions.push((date, cursor, portion_end));
            cursor = portion_end;
        }

        portions
    }

    /// Aggregate events inside `[window_start, window_end)`.
    ///
    /// A background transition exactly at `window_end` is kept: it closes a
    /// session whose interval still lies inside the window.
    ///
    /// Records are returned ordered by app id, then date.
    pub fn aggregate<I>(
        &self,
        events: I,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Vec<UsageRecord>
    where
        I: IntoIterator<Item = TransitionEvent>,
    {
        let mut events: Vec<TransitionEvent> = events
            .into_iter()
            .filter(|event| {
                event.at >= window_start
                    && (event.at < window_end
                        || (event.at == window_end && event.kind == TransitionKind::Background))
            })
            .collect();
        events.sort_by_key(|event| event.at);

        let mut open: HashMap<AppId, DateTime<Utc>> = HashMap::new();
        let mut records: BTreeMap<(AppId, NaiveDate), UsageRecord> = BTreeMap::new();

        for event in events {
            match event.kind {
                TransitionKind::Foreground => {
                    let date = self.local_date(event.at);
                    records
                        .entry((event.app.clone(), date))
                        .or_insert_with(|| UsageRecord::empty(event.app.clone(), date))
                        .add_launch(event.at);
                    open.entry(event.app).or_insert(event.at);
                }
                TransitionKind::Resume => {
                    open.entry(event.app).or_insert(event.at);
                }
                TransitionKind::Background => {
                    let Some(since) = open.remove(&event.app) else {
                        continue;
                    };
                    for (date, from, to) in self.split_by_day(since, event.at) {
                        records
                            .entry((event.app.clone(), date))
                            .or_insert_with(|| UsageRecord::empty(event.app.clone(), date))
                            .add_foreground(to.timestamp() - from.timestamp(), to);
                    }
                }
            }
        }

        records.into_values().collect()
    }
}

/// Time zone used to draw day boundaries for usage records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UsageZone {
    /// The host's local zone, including DST transitions.
    #[default]
    Local,
    Fixed(FixedOffset),
}

impl UsageZone {
    pub fn utc() -> Self {
        Self::Fixed(Utc.fix())
    }

    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        match self {
            Self::Local => UsageAggregator::new(Local).start_of_day(date),
            Self::Fixed(offset) => UsageAggregator::new(*offset).start_of_day(date),
        }
    }

    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        match self {
            Self::Local => UsageAggregator::new(Local).local_date(at),
            Self::Fixed(offset) => UsageAggregator::new(*offset).local_date(at),
        }
    }

    pub fn aggregate(
        &self,
        events: Vec<TransitionEvent>,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Vec<UsageRecord> {
        match self {
            Self::Local => UsageAggregator::new(Local).aggregate(events, window_start, window_end),
            Self::Fixed(offset) => {
                UsageAggregator::new(*offset).aggregate(events, window_start, window_end)
            }
        }
    }
}
