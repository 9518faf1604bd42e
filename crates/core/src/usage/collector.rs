//! Usage collector service - discovery and usage queries

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use timeguard_domain::{
    AppIdentity, DiscoverySource, EnumerationScope, Requirement, UsageRecord,
};
use tracing::{debug, instrument, warn};

use super::aggregator::UsageZone;
use super::ports::UsageSource;
use crate::permission::PermissionGate;
use crate::time::Clock;

/// Turns a platform [`UsageSource`] into identities and per-day records.
///
/// Both queries return empty results instead of errors when the usage
/// permission is missing or the source fails, so a sync pipeline keeps
/// running.
pub struct UsageCollector {
    source: Arc<dyn UsageSource>,
    gate: Arc<PermissionGate>,
    clock: Arc<dyn Clock>,
    zone: UsageZone,
    discovery_window_days: u32,
}

impl UsageCollector {
    pub fn new(
        source: Arc<dyn UsageSource>,
        gate: Arc<PermissionGate>,
        clock: Arc<dyn Clock>,
        zone: UsageZone,
        discovery_window_days: u32,
    ) -> Self {
        Self { source, gate, clock, zone, discovery_window_days }
    }

    pub fn enumeration_scope(&self) -> EnumerationScope {
        self.source.enumeration_scope()
    }

    pub fn discovery_source(&self) -> DiscoverySource {
        self.source.discovery_source()
    }

    pub fn zone(&self) -> UsageZone {
        self.zone
    }

    /// Installed applications, best effort.
    ///
    /// With a usage-derived scope this is every app seen in transition events
    /// over the discovery window, not a true installed list.
    #[instrument(skip(self))]
    pub async fn list_installed_apps(&self) -> Vec<AppIdentity> {
        if !self.gate.is_ready(Requirement::UsageTracking) {
            debug!("usage permission missing; skipping app discovery");
            return Vec::new();
        }

        match self.source.enumeration_scope() {
            EnumerationScope::Full => match self.source.installed_apps().await {
                Ok(apps) => apps,
                Err(err) => {
                    warn!(error = %err, "installed app enumeration failed");
                    Vec::new()
                }
            },
            EnumerationScope::UsageDerived => {
                let end = self.clock.now();
                let start = end - Duration::days(i64::from(self.discovery_window_days));
                match self.source.transition_events(start, end).await {
                    Ok(events) => {
                        let ids: BTreeSet<_> = events.into_iter().map(|event| event.app).collect();
                        ids.into_iter().map(AppIdentity::bare).collect()
                    }
                    Err(err) => {
                        warn!(error = %err, "usage-derived discovery failed");
                        Vec::new()
                    }
                }
            }
        }
    }

    /// Per-day records for `start_date..=end_date` in the collector's zone.
    ///
    /// The window runs from `start_date` 00:00 to the earlier of
    /// `end_date + 1` 00:00 and now.
    #[instrument(skip(self))]
    pub async fn query_usage(&self, start_date: NaiveDate, end_date: NaiveDate) -> Vec<UsageRecord> {
        if end_date < start_date {
            return Vec::new();
        }
        if !self.gate.is_ready(Requirement::UsageTracking) {
            debug!("usage permission missing; returning no usage");
            return Vec::new();
        }

        let window_start = self.zone.start_of_day(start_date);
        let day_after = end_date.succ_opt().unwrap_or(end_date);
        let window_end = self.zone.start_of_day(day_after).min(self.clock.now());
        if window_end <= window_start {
            return Vec::new();
        }

        match self.source.transition_events(window_start, window_end).await {
            Ok(events) => {
                let records = self.zone.aggregate(events, window_start, window_end);
                debug!(records = records.len(), "aggregated usage");
                records
            }
            Err(err) => {
                warn!(error = %err, "usage event query failed");
                Vec::new()
            }
        }
    }

    /// Records for the `days` most recent local dates, today included.
    pub async fn query_recent(&self, days: u32) -> Vec<UsageRecord> {
        let today = self.zone.local_date(self.clock.now());
        let start = today - Duration::days(i64::from(days.saturating_sub(1)));
        self.query_usage(start, today).await
    }
}
