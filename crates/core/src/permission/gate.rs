//! Per-capability permission state with single-flight requests

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use timeguard_domain::{
    Capability, PermissionOutcome, PermissionState, PermissionStatus, Requirement,
    RequirementMap, Result,
};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use super::ports::PermissionProvider;
use crate::time::Clock;

type OutcomeReceiver = watch::Receiver<Option<PermissionOutcome>>;

#[derive(Default)]
struct GateState {
    states: BTreeMap<Capability, PermissionState>,
    in_flight: HashMap<Capability, OutcomeReceiver>,
    checked_at: Option<DateTime<Utc>>,
}

/// Explicit permission state machine injected into every component that
/// needs to know whether it may track or block.
///
/// State only changes through [`check`](Self::check) and
/// [`request`](Self::request); a successful platform call elsewhere never
/// marks a capability approved.
pub struct PermissionGate {
    provider: Arc<dyn PermissionProvider>,
    requirements: RequirementMap,
    clock: Arc<dyn Clock>,
    inner: Arc<Mutex<GateState>>,
}

impl PermissionGate {
    pub fn new(
        provider: Arc<dyn PermissionProvider>,
        requirements: RequirementMap,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let states = requirements
            .all_capabilities()
            .into_iter()
            .map(|cap| (cap, PermissionState::NotDetermined))
            .collect();
        let inner = GateState { states, ..GateState::default() };

        Self { provider, requirements, clock, inner: Arc::new(Mutex::new(inner)) }
    }

    pub fn requirements(&self) -> &RequirementMap {
        &self.requirements
    }

    /// Query the OS for every capability the platform's requirements name.
    ///
    /// A provider error records `Denied` for that capability; this method
    /// itself never fails. Capabilities with a request in flight keep their
    /// `Requesting` state.
    #[instrument(skip(self))]
    pub async fn check(&self) -> PermissionStatus {
        for capability in self.requirements.all_capabilities() {
            let observed = match self.provider.check(capability).await {
                Ok(PermissionState::Requesting) => PermissionState::NotDetermined,
                Ok(state) => state,
                Err(err) => {
                    warn!(capability = %capability, error = %err, "permission check failed; treating as denied");
                    PermissionState::Denied
                }
            };

            let mut inner = self.inner.lock();
            if inner.in_flight.contains_key(&capability) {
                continue;
            }
            let previous = inner.states.insert(capability, observed);
            if previous != Some(observed) {
                debug!(capability = %capability, from = ?previous, to = %observed, "permission state changed");
            }
        }

        self.inner.lock().checked_at = Some(self.clock.now());
        self.status()
    }

    /// Ask for `capability`.
    ///
    /// Already approved: immediate `Granted`. Already requesting: waits for the
    /// in-flight request instead of prompting again. If the caller driving the
    /// prompt is dropped, waiters see `Denied` and the capability returns to
    /// `NotDetermined`.
    #[instrument(skip(self))]
    pub async fn request(&self, capability: Capability) -> Result<PermissionOutcome> {
        let slot = {
            let mut inner = self.inner.lock();
            if inner.states.get(&capability).copied().unwrap_or_default().is_approved() {
                Slot::Approved
            } else if let Some(rx) = inner.in_flight.get(&capability).cloned() {
                Slot::Join(rx)
            } else {
                let (tx, rx) = watch::channel(None);
                inner.in_flight.insert(capability, rx);
                inner.states.insert(capability, PermissionState::Requesting);
                Slot::Lead(tx)
            }
        };

        let tx = match slot {
            Slot::Approved => return Ok(PermissionOutcome::Granted),
            Slot::Join(rx) => {
                debug!(capability = %capability, "joining in-flight permission request");
                return Ok(Self::await_outcome(rx).await);
            }
            Slot::Lead(tx) => tx,
        };

        let mut flight = InFlight { inner: Arc::clone(&self.inner), capability, tx: Some(tx) };

        info!(capability = %capability, "requesting permission");
        match self.provider.request(capability).await {
            Ok(outcome) => {
                flight.finish(outcome);
                info!(capability = %capability, granted = outcome.is_granted(), "permission request finished");
                Ok(outcome)
            }
            Err(err) => {
                warn!(capability = %capability, error = %err, "permission request failed");
                flight.finish(PermissionOutcome::Denied);
                Err(err)
            }
        }
    }

    /// Cached readiness; call [`check`](Self::check) to refresh.
    pub fn is_ready(&self, requirement: Requirement) -> bool {
        self.status().is_ready(requirement)
    }

    /// Cached snapshot of every capability.
    pub fn status(&self) -> PermissionStatus {
        let inner = self.inner.lock();
        PermissionStatus::derive(inner.states.clone(), &self.requirements, inner.checked_at)
    }

    /// Capabilities of `requirement` that are not currently approved.
    pub fn missing(&self, requirement: Requirement) -> Vec<Capability> {
        let inner = self.inner.lock();
        self.requirements
            .capabilities_for(requirement)
            .iter()
            .copied()
            .filter(|cap| !inner.states.get(cap).copied().unwrap_or_default().is_approved())
            .collect()
    }

    async fn await_outcome(mut rx: OutcomeReceiver) -> PermissionOutcome {
        match rx.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome).unwrap_or(PermissionOutcome::Denied),
            Err(_) => PermissionOutcome::Denied,
        }
    }
}

enum Slot {
    Approved,
    Join(OutcomeReceiver),
    Lead(watch::Sender<Option<PermissionOutcome>>),
}

/// Owns the in-flight slot for one capability until the prompt resolves.
struct InFlight {
    inner: Arc<Mutex<GateState>>,
    capability: Capability,
    tx: Option<watch::Sender<Option<PermissionOutcome>>>,
}

impl InFlight {
    fn finish(&mut self, outcome: PermissionOutcome) {
        self.settle(outcome.into(), outcome);
    }

    fn settle(&mut self, state: PermissionState, broadcast: PermissionOutcome) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        {
            let mut inner = self.inner.lock();
            inner.in_flight.remove(&self.capability);
            inner.states.insert(self.capability, state);
        }
        tx.send_replace(Some(broadcast));
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.tx.is_some() {
            debug!(capability = %self.capability, "permission request abandoned");
            self.settle(PermissionState::NotDetermined, PermissionOutcome::Denied);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use timeguard_domain::TimeguardError;
    use tokio::sync::Notify;

    use super::*;
    use crate::time::SystemClock;

    struct ScriptedProvider {
        check: Mutex<Result<PermissionState>>,
        outcome: PermissionOutcome,
        release: Notify,
        requests: AtomicUsize,
        block: bool,
    }

    impl ScriptedProvider {
        fn new(check: Result<PermissionState>, outcome: PermissionOutcome, block: bool) -> Self {
            Self {
                check: Mutex::new(check),
                outcome,
                release: Notify::new(),
                requests: AtomicUsize::new(0),
                block,
            }
        }
    }

    #[async_trait]
    impl PermissionProvider for ScriptedProvider {
        async fn check(&self, _capability: Capability) -> Result<PermissionState> {
            self.check.lock().clone()
        }

        async fn request(&self, _capability: Capability) -> Result<PermissionOutcome> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            if self.block {
                self.release.notified().await;
            }
            Ok(self.outcome)
        }
    }

    fn requirements() -> RequirementMap {
        RequirementMap {
            usage_tracking: vec![Capability::UsageStatistics],
            blocking: vec![Capability::UsageStatistics, Capability::ProcessControl],
        }
    }

    fn gate(provider: Arc<ScriptedProvider>) -> Arc<PermissionGate> {
        Arc::new(PermissionGate::new(provider, requirements(), Arc::new(SystemClock)))
    }

    async fn wait_for_state(gate: &PermissionGate, cap: Capability, state: PermissionState) {
        for _ in 0..100 {
            if gate.status().state_of(cap) == state {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("capability {cap} never reached {state}");
    }

    #[tokio::test]
    async fn check_error_fails_closed() {
        let provider = Arc::new(ScriptedProvider::new(
            Err(TimeguardError::Platform("api exploded".into())),
            PermissionOutcome::Granted,
            false,
        ));
        let gate = gate(provider);

        let status = gate.check().await;

        assert_eq!(status.state_of(Capability::UsageStatistics), PermissionState::Denied);
        assert!(!gate.is_ready(Requirement::UsageTracking));
        assert!(!gate.is_ready(Requirement::Blocking));
        assert!(status.checked_at.is_some());
    }

    #[tokio::test]
    async fn check_observes_approval_granted_outside_the_app() {
        let provider = Arc::new(ScriptedProvider::new(
            Ok(PermissionState::Denied),
            PermissionOutcome::Denied,
            false,
        ));
        let gate = gate(Arc::clone(&provider));
        gate.check().await;
        assert!(!gate.is_ready(Requirement::Blocking));

        *provider.check.lock() = Ok(PermissionState::Approved);
        gate.check().await;
        assert!(gate.is_ready(Requirement::Blocking));
    }

    #[tokio::test]
    async fn approved_request_is_a_no_op() {
        let provider = Arc::new(ScriptedProvider::new(
            Ok(PermissionState::Approved),
            PermissionOutcome::Denied,
            false,
        ));
        let gate = gate(Arc::clone(&provider));
        gate.check().await;

        let outcome = gate.request(Capability::UsageStatistics).await.expect("request");
        assert_eq!(outcome, PermissionOutcome::Granted);
        assert_eq!(provider.requests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_prompt() {
        let provider = Arc::new(ScriptedProvider::new(
            Ok(PermissionState::NotDetermined),
            PermissionOutcome::Granted,
            true,
        ));
        let gate = gate(Arc::clone(&provider));

        let first = tokio::spawn({
            let gate = Arc::clone(&gate);
            async move { gate.request(Capability::UsageStatistics).await }
        });
        wait_for_state(&gate, Capability::UsageStatistics, PermissionState::Requesting).await;

        let second = tokio::spawn({
            let gate = Arc::clone(&gate);
            async move { gate.request(Capability::UsageStatistics).await }
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        provider.release.notify_one();

        assert_eq!(first.await.unwrap().unwrap(), PermissionOutcome::Granted);
        assert_eq!(second.await.unwrap().unwrap(), PermissionOutcome::Granted);
        assert_eq!(provider.requests.load(Ordering::SeqCst), 1);
        assert_eq!(gate.status().state_of(Capability::UsageStatistics), PermissionState::Approved);
    }

    #[tokio::test]
    async fn dropped_request_denies_waiters_and_resets_state() {
        let provider = Arc::new(ScriptedProvider::new(
            Ok(PermissionState::NotDetermined),
            PermissionOutcome::Granted,
            true,
        ));
        let gate = gate(Arc::clone(&provider));

        let first = tokio::spawn({
            let gate = Arc::clone(&gate);
            async move { gate.request(Capability::ProcessControl).await }
        });
        wait_for_state(&gate, Capability::ProcessControl, PermissionState::Requesting).await;

        let waiter = tokio::spawn({
            let gate = Arc::clone(&gate);
            async move { gate.request(Capability::ProcessControl).await }
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        first.abort();
        let _ = first.await;

        assert_eq!(waiter.await.unwrap().unwrap(), PermissionOutcome::Denied);
        assert_eq!(
            gate.status().state_of(Capability::ProcessControl),
            PermissionState::NotDetermined
        );
    }

    #[tokio::test]
    async fn denied_capability_can_be_requested_again() {
        let provider = Arc::new(ScriptedProvider::new(
            Ok(PermissionState::Denied),
            PermissionOutcome::Granted,
            false,
        ));
        let gate = gate(Arc::clone(&provider));
        gate.check().await;

        let outcome = gate.request(Capability::UsageStatistics).await.expect("request");
        assert_eq!(outcome, PermissionOutcome::Granted);
        assert!(gate.is_ready(Requirement::UsageTracking));
        assert_eq!(gate.missing(Requirement::Blocking), vec![Capability::ProcessControl]);
    }
}
