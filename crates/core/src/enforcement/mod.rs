//! Block enforcement across the three OS capability models
//!
//! [`BlockEnforcer`] is one contract with a tagged variant per model. Callers
//! branch on [`BlockEnforcer::descriptor`], never on platform identity.

pub mod backoff;
pub mod directives;
pub mod event_driven;
pub mod poll_kill;
pub mod ports;
pub mod shield;
pub mod supervisor;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use timeguard_domain::constants::{DEFAULT_MAX_BACKOFF_MS, DEFAULT_STOP_TIMEOUT_MS};
use timeguard_domain::{
    AppId, BlockDirective, CapabilityDescriptor, EnforcementConfig, EnforcementModel,
    EnforcementState, Result,
};

pub use directives::{DirectiveBoard, DirectiveSet, EnforcementLedger};
pub use event_driven::EventDrivenEnforcer;
pub use poll_kill::PollAndKillEnforcer;
pub use ports::{
    ForegroundControl, ForegroundSubscription, ProcessControl, RunningProcess, ShieldControl,
};
pub use shield::ShieldEnforcer;
pub use supervisor::{LoopHandle, LoopHealth};

/// Lifecycle limits shared by every strategy's loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    pub stop_timeout: Duration,
    pub max_backoff: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            stop_timeout: Duration::from_millis(DEFAULT_STOP_TIMEOUT_MS),
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
        }
    }
}

impl From<&EnforcementConfig> for LoopSettings {
    fn from(config: &EnforcementConfig) -> Self {
        Self { stop_timeout: config.stop_timeout(), max_backoff: config.max_backoff() }
    }
}

/// The enforcement strategy for the current platform.
pub enum BlockEnforcer {
    Shield(ShieldEnforcer),
    EventDriven(EventDrivenEnforcer),
    PollAndKill(PollAndKillEnforcer),
}

impl BlockEnforcer {
    pub fn descriptor(&self) -> CapabilityDescriptor {
        match self {
            Self::Shield(e) => e.descriptor(),
            Self::EventDriven(e) => e.descriptor(),
            Self::PollAndKill(e) => e.descriptor(),
        }
    }

    pub fn model(&self) -> EnforcementModel {
        self.descriptor().model
    }

    /// Replace the directive set.
    ///
    /// Only the shield strategy talks to the OS here; the others pick the new
    /// set up on their next event or tick.
    pub async fn apply(&self, directives: Vec<BlockDirective>) -> Result<()> {
        match self {
            Self::Shield(e) => e.apply(directives).await,
            Self::EventDriven(e) => e.apply(directives).await,
            Self::PollAndKill(e) => e.apply(directives).await,
        }
    }

    pub async fn remove(&self, app: &AppId) -> Result<()> {
        match self {
            Self::Shield(e) => e.remove(app).await,
            Self::EventDriven(e) => e.remove(app).await,
            Self::PollAndKill(e) => e.remove(app).await,
        }
    }

    /// Apps the engine believes are blocked right now. Never includes an app
    /// whose directive has expired.
    pub fn currently_enforced(&self) -> Vec<AppId> {
        match self {
            Self::Shield(e) => e.currently_enforced(),
            Self::EventDriven(e) => e.currently_enforced(),
            Self::PollAndKill(e) => e.currently_enforced(),
        }
    }

    pub fn enforcement_states(&self) -> BTreeMap<AppId, EnforcementState> {
        match self {
            Self::Shield(e) => e.enforcement_states(),
            Self::EventDriven(e) => e.enforcement_states(),
            Self::PollAndKill(e) => e.enforcement_states(),
        }
    }

    /// Start the strategy's loop, or return the one already running.
    ///
    /// `interval` only matters for poll-and-kill.
    pub async fn start_loop(&self, interval: Duration) -> Result<LoopHandle> {
        match self {
            Self::Shield(e) => e.start_loop().await,
            Self::EventDriven(e) => e.start_loop().await,
            Self::PollAndKill(e) => e.start_loop(interval).await,
        }
    }

    pub async fn stop_loop(&self, handle: &LoopHandle) -> Result<()> {
        match self {
            Self::Shield(e) => e.stop_loop(handle).await,
            Self::EventDriven(e) => e.stop_loop(handle).await,
            Self::PollAndKill(e) => e.stop_loop(handle).await,
        }
    }

    pub fn live_loop(&self) -> Option<LoopHandle> {
        match self {
            Self::Shield(e) => e.live_loop(),
            Self::EventDriven(e) => e.live_loop(),
            Self::PollAndKill(e) => e.live_loop(),
        }
    }

    /// Current directive snapshot, expired entries included.
    pub fn directives(&self) -> Arc<DirectiveSet> {
        match self {
            Self::Shield(e) => e.directives(),
            Self::EventDriven(e) => e.directives(),
            Self::PollAndKill(e) => e.directives(),
        }
    }
}

impl std::fmt::Debug for BlockEnforcer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockEnforcer").field("model", &self.model()).finish()
    }
}
