//! Event-driven strategy: react to foreground transitions
//!
//! The OS has already shown the blocked app by the time the transition
//! arrives, so the user may see it briefly before the return-to-home action
//! lands. That window cannot be closed from here.

use std::collections::BTreeMap;
use std::sync::Arc;

use timeguard_domain::{
    AppId, BlockDirective, CapabilityDescriptor, EnforcementModel, EnforcementState,
    EnumerationScope, Result,
};
use tracing::{debug, info, instrument, warn};

use super::directives::{DirectiveBoard, DirectiveSet, EnforcementLedger};
use super::ports::{ForegroundControl, ForegroundSubscription};
use super::supervisor::{LoopHandle, LoopHealth, LoopSlot};
use super::LoopSettings;
use crate::time::Clock;

pub struct EventDrivenEnforcer {
    control: Arc<dyn ForegroundControl>,
    clock: Arc<dyn Clock>,
    board: DirectiveBoard,
    ledger: EnforcementLedger,
    enumeration: EnumerationScope,
    settings: LoopSettings,
    loop_slot: LoopSlot,
}

impl EventDrivenEnforcer {
    pub fn new(
        control: Arc<dyn ForegroundControl>,
        clock: Arc<dyn Clock>,
        enumeration: EnumerationScope,
        settings: LoopSettings,
    ) -> Self {
        Self {
            control,
            clock,
            board: DirectiveBoard::new(),
            ledger: EnforcementLedger::new(),
            enumeration,
            settings,
            loop_slot: LoopSlot::default(),
        }
    }

    pub fn descriptor(&self) -> CapabilityDescriptor {
        CapabilityDescriptor::event_driven(self.enumeration)
    }

    pub async fn apply(&self, directives: Vec<BlockDirective>) -> Result<()> {
        self.publish(DirectiveSet::new(directives));
        Ok(())
    }

    pub async fn remove(&self, app: &AppId) -> Result<()> {
        self.publish(self.board.snapshot().without(app));
        Ok(())
    }

    /// Active apps covered by a live subscription whose last block attempt
    /// did not fail.
    pub fn currently_enforced(&self) -> Vec<AppId> {
        self.enforcement_states()
            .into_iter()
            .filter_map(|(app, state)| state.is_enforced().then_some(app))
            .collect()
    }

    pub fn enforcement_states(&self) -> BTreeMap<AppId, EnforcementState> {
        let set = self.board.snapshot();
        let now = self.clock.now();
        let monitoring = self.loop_slot.live().is_some();

        set.apps()
            .map(|app| {
                let state = if !set.is_blocked(app, now) || !monitoring {
                    EnforcementState::Unenforced
                } else {
                    match self.ledger.observed(app) {
                        Some(failed @ EnforcementState::EnforcementFailed(_)) => failed,
                        _ => EnforcementState::Enforced,
                    }
                };
                (app.clone(), state)
            })
            .collect()
    }

    /// Register the foreground subscription and start reacting to it.
    #[instrument(skip(self))]
    pub async fn start_loop(&self) -> Result<LoopHandle> {
        self.loop_slot
            .get_or_start(|| async {
                let subscription = self.control.subscribe().await?;
                let ctx = ReactorContext {
                    control: Arc::clone(&self.control),
                    clock: Arc::clone(&self.clock),
                    board: self.board.clone(),
                    ledger: self.ledger.clone(),
                };
                Ok(LoopHandle::spawn(EnforcementModel::EventDriven, move |token, health| {
                    async move {
                        tokio::select! {
                            biased;
                            _ = token.cancelled() => debug!("foreground reactor cancelled"),
                            _ = ctx.run(subscription, &health) => {}
                        }
                    }
                }))
            })
            .await
    }

    pub async fn stop_loop(&self, handle: &LoopHandle) -> Result<()> {
        self.loop_slot.stop(handle, self.settings.stop_timeout).await
    }

    pub fn live_loop(&self) -> Option<LoopHandle> {
        self.loop_slot.live()
    }

    pub fn directives(&self) -> Arc<DirectiveSet> {
        self.board.snapshot()
    }

    fn publish(&self, set: DirectiveSet) {
        let now = self.clock.now();
        self.ledger.retain(|app| set.is_blocked(app, now));
        self.board.publish(set);
    }
}

struct ReactorContext {
    control: Arc<dyn ForegroundControl>,
    clock: Arc<dyn Clock>,
    board: DirectiveBoard,
    ledger: EnforcementLedger,
}

impl ReactorContext {
    /// Consume foreground events until the stream ends. The subscription is
    /// dropped, and the OS registration released, when this future is.
    async fn run(&self, mut subscription: ForegroundSubscription, health: &LoopHealth) {
        while let Some(app) = subscription.recv().await {
            let now = self.clock.now();
            health.record_tick(now);

            let snapshot = self.board.snapshot();
            if !snapshot.is_blocked(&app, now) {
                continue;
            }

            match self.control.return_to_home(&app).await {
                Ok(()) => {
                    info!(app_id = %app, "blocked app foregrounded; returned to home");
                    health.record_terminations(1);
                    health.record_success();
                    self.ledger.record(app, EnforcementState::Enforced);
                }
                Err(err) => {
                    warn!(app_id = %app, error = %err, "return to home failed");
                    health.record_failure(&err);
                    self.ledger.record(app, EnforcementState::EnforcementFailed(err.to_string()));
                }
            }
        }
        warn!("foreground event stream ended");
    }
}
