//! Sync coordinator - ordered pipeline and loop ownership

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use timeguard_domain::{
    AppMetadata, BlockDirective, Capability, EnforcementModel, PermissionOutcome, Requirement,
    Result, TimeguardError,
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::ports::{AppRepository, BlockPolicyRepository, UsageRepository};
use crate::enforcement::{BlockEnforcer, LoopHandle};
use crate::permission::PermissionGate;
use crate::time::Clock;
use crate::usage::UsageCollector;

const REQUIREMENTS: [Requirement; 2] = [Requirement::UsageTracking, Requirement::Blocking];

/// Pipeline knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Label stored with every discovered app and shown in diagnostics.
    pub platform: String,
    pub lookback_days: u32,
    pub poll_interval: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            platform: "desktop".to_string(),
            lookback_days: timeguard_domain::constants::DEFAULT_LOOKBACK_DAYS,
            poll_interval: Duration::from_millis(
                timeguard_domain::constants::DEFAULT_POLL_INTERVAL_MS,
            ),
        }
    }
}

/// Outcome of one [`SyncCoordinator::full_sync`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub apps_upserted: usize,
    pub usage_upserted: usize,
    pub directives: usize,
    pub active_directives: usize,
    /// `true` when the policy read failed and the previous snapshot was used.
    pub policy_stale: bool,
    pub loop_id: Option<Uuid>,
    /// Soft failures that were logged and left for the next cycle.
    pub warnings: Vec<String>,
}

/// Owns the sync pipeline and the enforcement loop registry.
///
/// At most one `full_sync` runs at a time. Loops are tracked per
/// [`EnforcementModel`] so repeated syncs never start a second loop and a
/// loop whose task died is restarted.
pub struct SyncCoordinator {
    gate: Arc<PermissionGate>,
    collector: Arc<UsageCollector>,
    app_repo: Arc<dyn AppRepository>,
    usage_repo: Arc<dyn UsageRepository>,
    policy_repo: Arc<dyn BlockPolicyRepository>,
    enforcer: RwLock<Arc<BlockEnforcer>>,
    clock: Arc<dyn Clock>,
    settings: SyncSettings,
    sync_lock: tokio::sync::Mutex<()>,
    loops: tokio::sync::Mutex<HashMap<EnforcementModel, LoopHandle>>,
    last_directives: Mutex<Option<Vec<BlockDirective>>>,
    last_report: Mutex<Option<SyncReport>>,
    unavailable_reported: AtomicBool,
}

impl SyncCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gate: Arc<PermissionGate>,
        collector: Arc<UsageCollector>,
        app_repo: Arc<dyn AppRepository>,
        usage_repo: Arc<dyn UsageRepository>,
        policy_repo: Arc<dyn BlockPolicyRepository>,
        enforcer: BlockEnforcer,
        clock: Arc<dyn Clock>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            gate,
            collector,
            app_repo,
            usage_repo,
            policy_repo,
            enforcer: RwLock::new(Arc::new(enforcer)),
            clock,
            settings,
            sync_lock: tokio::sync::Mutex::new(()),
            loops: tokio::sync::Mutex::new(HashMap::new()),
            last_directives: Mutex::new(None),
            last_report: Mutex::new(None),
            unavailable_reported: AtomicBool::new(false),
        }
    }

    pub fn gate(&self) -> &Arc<PermissionGate> {
        &self.gate
    }

    pub fn enforcer(&self) -> Arc<BlockEnforcer> {
        Arc::clone(&self.enforcer.read())
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn last_report(&self) -> Option<SyncReport> {
        self.last_report.lock().clone()
    }

    /// Run the whole pipeline: permissions, apps, usage, policy, enforcement.
    ///
    /// Only a permission denial is returned as an error; everything else is
    /// logged, listed in the report and retried on the next cycle.
    #[instrument(skip(self))]
    pub async fn full_sync(&self) -> Result<SyncReport> {
        let _serialized = self.sync_lock.lock().await;
        let started_at = self.clock.now();
        let mut warnings = Vec::new();

        self.ensure_permissions().await?;

        let apps_upserted = self.sync_apps(&mut warnings).await;
        let usage_upserted = self.sync_usage(&mut warnings).await;
        let (directives, policy_stale) = self.load_policy(&mut warnings).await;

        let enforcer = self.enforcer();
        let active_directives =
            directives.iter().filter(|d| d.is_active_at(self.clock.now())).count();
        let directive_count = directives.len();
        if let Err(err) = enforcer.apply(directives).await {
            self.note_enforcement_error(&err, "apply");
            warnings.push(err.to_string());
        }

        let loop_id = match self.ensure_loop(&enforcer).await {
            Ok(handle) => Some(handle.id()),
            Err(err) => {
                self.note_enforcement_error(&err, "start_loop");
                warnings.push(err.to_string());
                None
            }
        };

        let report = SyncReport {
            started_at,
            finished_at: self.clock.now(),
            apps_upserted,
            usage_upserted,
            directives: directive_count,
            active_directives,
            policy_stale,
            loop_id,
            warnings,
        };
        info!(
            apps = report.apps_upserted,
            usage = report.usage_upserted,
            directives = report.directives,
            warnings = report.warnings.len(),
            "full sync finished"
        );
        *self.last_report.lock() = Some(report.clone());
        Ok(report)
    }

    /// Refresh permission state and request whatever is missing.
    ///
    /// Each missing capability is requested at most once per call; the first
    /// denial stops the pipeline.
    async fn ensure_permissions(&self) -> Result<()> {
        self.gate.check().await;

        let mut requested: HashSet<Capability> = HashSet::new();
        for requirement in REQUIREMENTS {
            if self.gate.is_ready(requirement) {
                continue;
            }
            for capability in self.gate.missing(requirement) {
                if !requested.insert(capability) {
                    continue;
                }
                match self.gate.request(capability).await {
                    Ok(PermissionOutcome::Granted) => {}
                    Ok(PermissionOutcome::Denied) => {
                        warn!(capability = %capability, requirement = %requirement, "permission denied; stopping sync");
                        return Err(TimeguardError::PermissionDenied(capability.to_string()));
                    }
                    Err(err) => {
                        warn!(capability = %capability, error = %err, "permission request failed; stopping sync");
                        return Err(TimeguardError::PermissionDenied(format!("{capability}: {err}")));
                    }
                }
            }
        }
        Ok(())
    }

    async fn sync_apps(&self, warnings: &mut Vec<String>) -> usize {
        let apps = self.collector.list_installed_apps().await;
        let metadata = AppMetadata {
            platform: self.settings.platform.clone(),
            source: self.collector.discovery_source(),
            discovered_at: self.clock.now(),
        };

        let mut seen = HashSet::new();
        let mut upserted = 0;
        for app in apps {
            if !seen.insert(app.id.clone()) {
                continue;
            }
            match self.app_repo.upsert_app(&app, &metadata).await {
                Ok(()) => upserted += 1,
                Err(err) => {
                    warn!(app_id = %app.id, error = %err, "app upsert failed");
                    warnings.push(format!("upsert_app {}: {err}", app.id));
                }
            }
        }
        debug!(upserted, "apps synced");
        upserted
    }

    async fn sync_usage(&self, warnings: &mut Vec<String>) -> usize {
        let records = self.collector.query_recent(self.settings.lookback_days).await;

        let mut seen = HashSet::new();
        let mut upserted = 0;
        for record in records {
            if !seen.insert(record.key()) {
                continue;
            }
            match self.usage_repo.upsert_usage(&record).await {
                Ok(()) => upserted += 1,
                Err(err) => {
                    warn!(app_id = %record.app, date = %record.date, error = %err, "usage upsert failed");
                    warnings.push(format!("upsert_usage {} {}: {err}", record.app, record.date));
                }
            }
        }
        debug!(upserted, "usage synced");
        upserted
    }

    async fn load_policy(&self, warnings: &mut Vec<String>) -> (Vec<BlockDirective>, bool) {
        match self.policy_repo.get_blocked_apps().await {
            Ok(directives) => {
                *self.last_directives.lock() = Some(directives.clone());
                (directives, false)
            }
            Err(err) => {
                warn!(error = %err, "reading block policy failed; keeping previous snapshot");
                warnings.push(format!("get_blocked_apps: {err}"));
                let previous = self.last_directives.lock().clone().unwrap_or_default();
                (previous, true)
            }
        }
    }

    /// Start the enforcer's loop unless a live one is registered.
    async fn ensure_loop(&self, enforcer: &BlockEnforcer) -> Result<LoopHandle> {
        let model = enforcer.model();
        let mut loops = self.loops.lock().await;

        if let Some(handle) = loops.get(&model) {
            if handle.is_alive() {
                return Ok(handle.clone());
            }
            warn!(model = %model, loop_id = %handle.id(), "enforcement loop died; restarting");
            loops.remove(&model);
        }

        let handle = enforcer.start_loop(self.settings.poll_interval).await?;
        loops.insert(model, handle.clone());
        Ok(handle)
    }

    /// Start enforcement with the last known policy, without a full sync.
    #[instrument(skip(self))]
    pub async fn start_background_services(&self) -> Result<LoopHandle> {
        let enforcer = self.enforcer();
        let previous = self.last_directives.lock().clone();
        if let Some(directives) = previous {
            if let Err(err) = enforcer.apply(directives).await {
                self.note_enforcement_error(&err, "apply");
            }
        }
        self.ensure_loop(&enforcer).await.inspect_err(|err| {
            self.note_enforcement_error(err, "start_loop");
        })
    }

    /// Stop every registered loop. Errors are logged; the registry is always
    /// emptied.
    #[instrument(skip(self))]
    pub async fn stop_background_services(&self) {
        let enforcer = self.enforcer();
        let drained: Vec<_> = self.loops.lock().await.drain().collect();
        for (model, handle) in drained {
            match enforcer.stop_loop(&handle).await {
                Ok(()) => info!(model = %model, loop_id = %handle.id(), "enforcement loop stopped"),
                Err(err) => warn!(model = %model, error = %err, "enforcement loop stop failed"),
            }
        }
    }

    /// Install a different strategy. Any running loop is stopped first; the
    /// current directives carry over and a loop is restarted if one was
    /// running.
    #[instrument(skip(self, next))]
    pub async fn switch_enforcer(&self, next: BlockEnforcer) -> Result<()> {
        let _serialized = self.sync_lock.lock().await;

        let was_running = !self.loops.lock().await.is_empty();
        self.stop_background_services().await;

        let previous = self.enforcer();
        let directives: Vec<BlockDirective> = previous.directives().directives().collect();
        let next = Arc::new(next);
        info!(from = %previous.model(), to = %next.model(), "switching enforcement strategy");

        if let Err(err) = next.apply(directives).await {
            self.note_enforcement_error(&err, "apply");
        }
        *self.enforcer.write() = Arc::clone(&next);

        if was_running {
            self.ensure_loop(&next).await?;
        }
        Ok(())
    }

    /// Refresh permissions and request anything missing. `true` when both
    /// tracking and blocking are ready afterwards.
    pub async fn request_permissions(&self) -> bool {
        match self.ensure_permissions().await {
            Ok(()) => self.has_cached_permissions(),
            Err(err) => {
                debug!(error = %err, "permission request did not complete");
                false
            }
        }
    }

    /// Re-check permissions with the OS without prompting.
    pub async fn has_required_permissions(&self) -> bool {
        self.gate.check().await;
        self.has_cached_permissions()
    }

    fn has_cached_permissions(&self) -> bool {
        REQUIREMENTS.iter().all(|req| self.gate.is_ready(*req))
    }

    pub async fn is_loop_running(&self) -> bool {
        let model = self.enforcer().model();
        self.loops.lock().await.get(&model).is_some_and(LoopHandle::is_alive)
    }

    /// Diagnostic key/value view. Not for control flow.
    pub async fn platform_info(&self) -> BTreeMap<String, String> {
        let enforcer = self.enforcer();
        let descriptor = enforcer.descriptor();
        let status = self.gate.status();
        let mut info = BTreeMap::new();

        info.insert("platform".into(), self.settings.platform.clone());
        info.insert("enforcement.model".into(), descriptor.model.to_string());
        info.insert("enforcement.latency".into(), descriptor.latency.to_string());
        info.insert("enforcement.requires_polling".into(), descriptor.requires_polling.to_string());
        info.insert("enumeration.scope".into(), descriptor.enumeration.to_string());
        info.insert(
            "enforcement.poll_interval_ms".into(),
            self.settings.poll_interval.as_millis().to_string(),
        );

        let handle = self.loops.lock().await.get(&descriptor.model).cloned();
        match handle {
            Some(handle) if handle.is_alive() => {
                let health = handle.health();
                info.insert("loop.state".into(), "running".into());
                info.insert("loop.id".into(), handle.id().to_string());
                info.insert("loop.ticks".into(), health.ticks().to_string());
                info.insert("loop.terminations".into(), health.terminations().to_string());
                info.insert("loop.failures".into(), health.failures().to_string());
                if let Some(last_error) = health.last_error() {
                    info.insert("loop.last_error".into(), last_error);
                }
            }
            Some(_) => {
                info.insert("loop.state".into(), "dead".into());
            }
            None => {
                info.insert("loop.state".into(), "stopped".into());
            }
        }

        for (capability, state) in &status.states {
            info.insert(format!("permission.{capability}"), state.to_string());
        }
        info.insert("ready.usage_tracking".into(), status.ready_for_usage_tracking.to_string());
        info.insert("ready.blocking".into(), status.ready_for_blocking.to_string());

        info.insert("directives.total".into(), enforcer.directives().len().to_string());
        info.insert("directives.enforced".into(), enforcer.currently_enforced().len().to_string());

        if let Some(report) = self.last_report() {
            info.insert("sync.last_finished_at".into(), report.finished_at.to_rfc3339());
            info.insert("sync.last_apps".into(), report.apps_upserted.to_string());
            info.insert("sync.last_usage".into(), report.usage_upserted.to_string());
        }

        info
    }

    fn note_enforcement_error(&self, err: &TimeguardError, operation: &'static str) {
        match err {
            TimeguardError::CapabilityUnavailable(_) => {
                if !self.unavailable_reported.swap(true, Ordering::Relaxed) {
                    warn!(operation, error = %err, "enforcement capability unavailable on this platform");
                } else {
                    debug!(operation, error = %err, "enforcement capability unavailable");
                }
            }
            _ => warn!(operation, error = %err, "enforcement step failed; retrying next cycle"),
        }
    }
}
