//! Declarative-shield strategy

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use timeguard_domain::{
    AppId, BlockDirective, CapabilityDescriptor, EnforcementModel, EnforcementState,
    EnumerationScope, Result, TimeguardError,
};
use tracing::{debug, instrument, warn};

use super::directives::{DirectiveBoard, DirectiveSet, EnforcementLedger};
use super::ports::ShieldControl;
use super::supervisor::{LoopHandle, LoopSlot};
use super::LoopSettings;
use crate::time::Clock;

/// Hands the whole active set to the OS in one set-replace call.
///
/// The OS intercepts launches itself, so there is no loop; expiry instants go
/// to the OS with each directive.
pub struct ShieldEnforcer {
    control: Arc<dyn ShieldControl>,
    clock: Arc<dyn Clock>,
    board: DirectiveBoard,
    ledger: EnforcementLedger,
    enumeration: EnumerationScope,
    settings: LoopSettings,
    loop_slot: LoopSlot,
}

impl ShieldEnforcer {
    pub fn new(
        control: Arc<dyn ShieldControl>,
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
        CapabilityDescriptor::declarative_shield(self.enumeration)
    }

    #[instrument(skip(self, directives))]
    pub async fn apply(&self, directives: Vec<BlockDirective>) -> Result<()> {
        self.replace(DirectiveSet::new(directives)).await
    }

    pub async fn remove(&self, app: &AppId) -> Result<()> {
        let next = self.board.snapshot().without(app);
        self.replace(next).await
    }

    pub fn currently_enforced(&self) -> Vec<AppId> {
        self.ledger.enforced(&self.board.snapshot(), self.clock.now())
    }

    pub fn enforcement_states(&self) -> BTreeMap<AppId, EnforcementState> {
        self.ledger.states(&self.board.snapshot(), self.clock.now())
    }

    /// Nothing to run; returns a healthy passive handle.
    pub async fn start_loop(&self) -> Result<LoopHandle> {
        self.loop_slot
            .get_or_start(|| async { Ok(LoopHandle::passive(EnforcementModel::DeclarativeShield)) })
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

    async fn replace(&self, set: DirectiveSet) -> Result<()> {
        let active = set.active_at(self.clock.now());
        self.board.publish(set);

        match self.control.replace_shield(&active).await {
            Ok(()) => {
                debug!(shielded = active.len(), "shield set replaced");
                self.ledger.reset(
                    active.into_iter().map(|d| (d.app, EnforcementState::Enforced)).collect(),
                );
                Ok(())
            }
            Err(err @ TimeguardError::CapabilityUnavailable(_)) => {
                self.ledger.reset(failed(&active, &err));
                Err(err)
            }
            Err(err) => {
                warn!(error = %err, shielded = active.len(), "shield update failed");
                self.ledger.reset(failed(&active, &err));
                Err(TimeguardError::TransientPlatform(err.to_string()))
            }
        }
    }
}

fn failed(active: &[BlockDirective], err: &TimeguardError) -> HashMap<AppId, EnforcementState> {
    active
        .iter()
        .map(|d| (d.app.clone(), EnforcementState::EnforcementFailed(err.to_string())))
        .collect()
}
