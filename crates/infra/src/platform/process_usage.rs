//! Usage source built from periodic process-table samples
//!
//! Desktop platforms have no foreground history API. Instead each sample
//! opens a session for every program that appeared and closes the session of
//! every program that is gone, and [`ProcessUsageSource::transition_events`]
//! replays those sessions as foreground/background transitions. "Foreground"
//! therefore means "running" here.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use timeguard_core::{Clock, ProcessControl, UsageSource};
use timeguard_domain::{
    AppId, AppIdentity, DiscoverySource, EnumerationScope, Result, TransitionEvent,
};
use tracing::{debug, instrument};

/// One contiguous run of an app, from first observation to disappearance.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Session {
    app: AppId,
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct SessionLog {
    open: HashMap<AppId, Session>,
    closed: Vec<Session>,
    last_sample: Option<DateTime<Utc>>,
}

/// Outcome of one [`ProcessUsageSource::sample`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleSummary {
    pub opened: usize,
    pub closed: usize,
    pub running: usize,
}

pub struct ProcessUsageSource {
    control: Arc<dyn ProcessControl>,
    clock: Arc<dyn Clock>,
    retention: Duration,
    log: Mutex<SessionLog>,
}

impl ProcessUsageSource {
    /// `retention` bounds how long closed sessions are kept; it should cover
    /// the longest window any caller queries.
    pub fn new(control: Arc<dyn ProcessControl>, clock: Arc<dyn Clock>, retention: Duration) -> Self {
        Self { control, clock, retention, log: Mutex::new(SessionLog::default()) }
    }

    /// Read the process table once and update the session log.
    ///
    /// A newly seen app's session starts at the earliest start time among its
    /// processes (or now, when unknown); a session closes at the sample that
    /// no longer sees the app.
    #[instrument(skip(self))]
    pub async fn sample(&self) -> Result<SampleSummary> {
        let processes = self.control.running_processes().await?;
        let now = self.clock.now();

        let mut seen: BTreeMap<AppId, DateTime<Utc>> = BTreeMap::new();
        for process in processes {
            let started = process.started_at.map_or(now, |at| at.min(now));
            seen.entry(process.app)
                .and_modify(|earliest| *earliest = (*earliest).min(started))
                .or_insert(started);
        }

        let mut log = self.log.lock();
        let gone: Vec<AppId> =
            log.open.keys().filter(|app| !seen.contains_key(*app)).cloned().collect();
        for app in &gone {
            if let Some(mut session) = log.open.remove(app) {
                session.end = Some(now);
                log.closed.push(session);
            }
        }

        let mut opened = 0;
        for (app, start) in seen {
            log.open.entry(app.clone()).or_insert_with(|| {
                opened += 1;
                Session { app, start, end: None }
            });
        }

        let horizon = now - self.retention;
        log.closed.retain(|session| session.end.is_some_and(|end| end >= horizon));
        log.last_sample = Some(now);

        let summary = SampleSummary { opened, closed: gone.len(), running: log.open.len() };
        debug!(
            opened = summary.opened,
            closed = summary.closed,
            running = summary.running,
            "sampled process table"
        );
        Ok(summary)
    }

    /// Number of apps currently considered running.
    pub fn open_sessions(&self) -> usize {
        self.log.lock().open.len()
    }
}

#[async_trait]
impl UsageSource for ProcessUsageSource {
    fn enumeration_scope(&self) -> EnumerationScope {
        EnumerationScope::UsageDerived
    }

    fn discovery_source(&self) -> DiscoverySource {
        DiscoverySource::RunningProcess
    }

    async fn installed_apps(&self) -> Result<Vec<AppIdentity>> {
        let log = self.log.lock();
        let mut ids: Vec<AppId> = log
            .open
            .keys()
            .chain(log.closed.iter().map(|session| &session.app))
            .cloned()
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids.into_iter().map(AppIdentity::bare).collect())
    }

    /// Sessions overlapping `[start, end)`, clipped to it.
    ///
    /// An open session is treated as ending at the last sample. A session
    /// already running at `start` resumes at `start` without counting a
    /// launch. A session running past `end` is closed exactly at `end`.
    async fn transition_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TransitionEvent>> {
        if end <= start {
            return Ok(Vec::new());
        }

        let log = self.log.lock();
        let horizon = log.last_sample.unwrap_or(start);

        let mut events = Vec::new();
        for session in log.closed.iter().chain(log.open.values()) {
            let session_end = session.end.unwrap_or(horizon);
            if session.start >= end || session_end <= start {
                continue;
            }

            let from = if session.start < start {
                events.push(TransitionEvent::resume(session.app.clone(), start));
                start
            } else {
                events.push(TransitionEvent::foreground(session.app.clone(), session.start));
                session.start
            };

            let until = session_end.min(end);
            if until > from {
                events.push(TransitionEvent::background(session.app.clone(), until));
            }
        }

        Ok(events)
    }
}
