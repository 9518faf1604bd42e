use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use timeguard_core::{
    ForegroundControl, ForegroundSubscription, PermissionProvider, ProcessControl,
    RunningProcess, ShieldControl, UsageSource,
};
use timeguard_domain::{
    AppId, AppIdentity, BlockDirective, Capability, EnumerationScope, PermissionOutcome,
    PermissionState, Result, TimeguardError, TransitionEvent,
};
use tokio::sync::mpsc;

/// Permission provider with a fixed OS answer per capability.
///
/// `request` grants unless the capability was marked as refused.
#[derive(Default)]
pub struct FakePermissionProvider {
    states: Mutex<HashMap<Capability, PermissionState>>,
    refused: Mutex<HashSet<Capability>>,
    pub requests: AtomicUsize,
}

impl FakePermissionProvider {
    pub fn approving_all() -> Arc<Self> {
        let provider = Self::default();
        for capability in Capability::ALL {
            provider.states.lock().insert(capability, PermissionState::Approved);
        }
        Arc::new(provider)
    }

    pub fn undetermined() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn refuse(&self, capability: Capability) {
        self.refused.lock().insert(capability);
    }

    pub fn set(&self, capability: Capability, state: PermissionState) {
        self.states.lock().insert(capability, state);
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PermissionProvider for FakePermissionProvider {
    async fn check(&self, capability: Capability) -> Result<PermissionState> {
        Ok(self.states.lock().get(&capability).copied().unwrap_or_default())
    }

    async fn request(&self, capability: Capability) -> Result<PermissionOutcome> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.refused.lock().contains(&capability) {
            self.states.lock().insert(capability, PermissionState::Denied);
            return Ok(PermissionOutcome::Denied);
        }
        self.states.lock().insert(capability, PermissionState::Approved);
        Ok(PermissionOutcome::Granted)
    }
}

/// Usage source backed by fixed app and event lists.
pub struct FakeUsageSource {
    scope: EnumerationScope,
    apps: Mutex<Vec<AppIdentity>>,
    events: Mutex<Vec<TransitionEvent>>,
    pub queried: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
}

impl FakeUsageSource {
    pub fn new(scope: EnumerationScope) -> Self {
        Self {
            scope,
            apps: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            queried: Mutex::new(Vec::new()),
        }
    }

    pub fn with_apps(self, apps: Vec<AppIdentity>) -> Self {
        *self.apps.lock() = apps;
        self
    }

    pub fn with_events(self, events: Vec<TransitionEvent>) -> Self {
        *self.events.lock() = events;
        self
    }

    pub fn last_query(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.queried.lock().last().copied()
    }
}

#[async_trait]
impl UsageSource for FakeUsageSource {
    fn enumeration_scope(&self) -> EnumerationScope {
        self.scope
    }

    async fn installed_apps(&self) -> Result<Vec<AppIdentity>> {
        Ok(self.apps.lock().clone())
    }

    async fn transition_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TransitionEvent>> {
        self.queried.lock().push((start, end));
        Ok(self
            .events
            .lock()
            .iter()
            .filter(|event| event.at >= start && event.at < end)
            .cloned()
            .collect())
    }
}

/// Process table that tests can populate, break and make unkillable.
#[derive(Default)]
pub struct FakeProcessControl {
    processes: Mutex<Vec<RunningProcess>>,
    unkillable: Mutex<HashSet<AppId>>,
    listing_fails: AtomicBool,
    pub listings: AtomicUsize,
    pub kills: AtomicUsize,
}

impl FakeProcessControl {
    pub fn spawn_process(&self, pid: u32, name: &str) {
        self.processes.lock().push(RunningProcess::new(pid, name));
    }

    pub fn make_unkillable(&self, app: &str) {
        self.unkillable.lock().insert(AppId::new(app));
    }

    pub fn fail_listing(&self, fail: bool) {
        self.listing_fails.store(fail, Ordering::SeqCst);
    }

    pub fn is_running(&self, app: &str) -> bool {
        let app = AppId::new(app);
        self.processes.lock().iter().any(|p| p.app == app)
    }

    pub fn kill_count(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }

    pub fn listing_count(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessControl for FakeProcessControl {
    async fn running_processes(&self) -> Result<Vec<RunningProcess>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        if self.listing_fails.load(Ordering::SeqCst) {
            return Err(TimeguardError::Platform("process table unavailable".into()));
        }
        Ok(self.processes.lock().clone())
    }

    async fn terminate(&self, process: &RunningProcess) -> Result<()> {
        if self.unkillable.lock().contains(&process.app) {
            return Err(TimeguardError::Platform(format!("access denied for pid {}", process.pid)));
        }
        self.processes.lock().retain(|p| p.pid != process.pid);
        self.kills.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Shield that records every set it is handed.
#[derive(Default)]
pub struct FakeShieldControl {
    pub calls: Mutex<Vec<Vec<BlockDirective>>>,
    unavailable: AtomicBool,
    failing: AtomicBool,
}

impl FakeShieldControl {
    pub fn unavailable() -> Self {
        let shield = Self::default();
        shield.unavailable.store(true, Ordering::SeqCst);
        shield
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn last_set(&self) -> Option<Vec<BlockDirective>> {
        self.calls.lock().last().cloned()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl ShieldControl for FakeShieldControl {
    async fn replace_shield(&self, directives: &[BlockDirective]) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TimeguardError::CapabilityUnavailable("no shield API".into()));
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(TimeguardError::Platform("shield store rejected the update".into()));
        }
        self.calls.lock().push(directives.to_vec());
        Ok(())
    }
}

/// Foreground monitor whose events tests push by hand.
#[derive(Default)]
pub struct FakeForegroundControl {
    sender: Mutex<Option<mpsc::Sender<AppId>>>,
    released: Arc<AtomicBool>,
    pub subscriptions: AtomicUsize,
    pub home_calls: Mutex<Vec<AppId>>,
}

impl FakeForegroundControl {
    /// Emit a foreground transition. Returns false if nobody is subscribed.
    pub async fn foreground(&self, app: &str) -> bool {
        let sender = self.sender.lock().clone();
        match sender {
            Some(tx) => tx.send(AppId::new(app)).await.is_ok(),
            None => false,
        }
    }

    /// Close the event stream as if the OS dropped the registration.
    pub fn end_stream(&self) {
        self.sender.lock().take();
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub fn homed(&self) -> Vec<AppId> {
        self.home_calls.lock().clone()
    }
}

#[async_trait]
impl ForegroundControl for FakeForegroundControl {
    async fn subscribe(&self) -> Result<ForegroundSubscription> {
        let (tx, rx) = mpsc::channel(16);
        *self.sender.lock() = Some(tx);
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        self.released.store(false, Ordering::SeqCst);
        let released = Arc::clone(&self.released);
        Ok(ForegroundSubscription::new(rx, move || released.store(true, Ordering::SeqCst)))
    }

    async fn return_to_home(&self, app: &AppId) -> Result<()> {
        self.home_calls.lock().push(app.clone());
        Ok(())
    }
}
