//! Platform adapters and profile selection
//!
//! # Profiles
//!
//! - **desktop**: `sysinfo` process table for poll-and-kill and for usage
//!   sampling. No user grant is needed.
//! - **macos**: NSWorkspace activation notifications for the event-driven
//!   model; running applications (by bundle id) for usage sampling.
//!   Blocking requires Accessibility trust.
//! - **shield**: declarative model. Targets without an OS shielding API get
//!   an adapter that reports `CapabilityUnavailable`, so only usage tracking
//!   runs.

pub mod desktop;
#[cfg(target_os = "macos")]
pub mod macos;
pub mod process_usage;
pub mod shield;

use std::sync::Arc;

use timeguard_core::{
    BlockEnforcer, Clock, EventDrivenEnforcer, LoopSettings, PermissionProvider,
    PollAndKillEnforcer, ProcessControl, ShieldEnforcer, UsageSource,
};
use timeguard_domain::{Capability, EnumerationScope, PlatformProfile, RequirementMap, Result};
use tracing::info;

pub use desktop::{StaticPermissionProvider, SysinfoProcessControl};
#[cfg(target_os = "macos")]
pub use macos::{AccessibilityPermissionProvider, WorkspaceForegroundControl, WorkspaceProcessTable};
pub use process_usage::{ProcessUsageSource, SampleSummary};
pub use shield::UnsupportedShieldControl;

/// Everything one profile contributes to the engine.
pub struct PlatformAdapters {
    pub profile: PlatformProfile,
    pub requirements: RequirementMap,
    pub permissions: Arc<dyn PermissionProvider>,
    pub usage: Arc<dyn UsageSource>,
    /// Set when usage comes from periodic sampling; the owner must drive
    /// [`ProcessUsageSource::sample`].
    pub sampler: Option<Arc<ProcessUsageSource>>,
    pub enforcer: BlockEnforcer,
}

impl std::fmt::Debug for PlatformAdapters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformAdapters")
            .field("profile", &self.profile)
            .field("requirements", &self.requirements)
            .field("enforcer", &self.enforcer)
            .field("sampled", &self.sampler.is_some())
            .finish_non_exhaustive()
    }
}

/// Capabilities each profile needs before tracking or blocking.
pub fn requirements_for(profile: PlatformProfile) -> RequirementMap {
    match profile {
        PlatformProfile::Desktop => RequirementMap {
            usage_tracking: vec![Capability::UsageStatistics],
            blocking: vec![Capability::ProcessControl],
        },
        PlatformProfile::Macos => RequirementMap {
            usage_tracking: vec![Capability::UsageStatistics],
            blocking: vec![Capability::Accessibility],
        },
        // Without a shield API there is no authorization to ask for.
        PlatformProfile::Shield => RequirementMap::default(),
    }
}

/// Build the adapters for `profile` on the current target.
///
/// `retention` bounds the sampled session log and should cover the longest
/// usage window queried (discovery window or lookback, whichever is larger).
pub fn build_platform(
    profile: PlatformProfile,
    clock: Arc<dyn Clock>,
    settings: LoopSettings,
    retention: chrono::Duration,
) -> Result<PlatformAdapters> {
    let table = native_process_table();
    let sampler =
        Arc::new(ProcessUsageSource::new(Arc::clone(&table), Arc::clone(&clock), retention));
    let scope = EnumerationScope::UsageDerived;

    let (permissions, enforcer): (Arc<dyn PermissionProvider>, BlockEnforcer) = match profile {
        PlatformProfile::Desktop => (
            Arc::new(StaticPermissionProvider::desktop()),
            BlockEnforcer::PollAndKill(PollAndKillEnforcer::new(table, clock, scope, settings)),
        ),
        PlatformProfile::Macos => macos_adapters(clock, scope, settings)?,
        PlatformProfile::Shield => (
            Arc::new(StaticPermissionProvider::default()),
            BlockEnforcer::Shield(ShieldEnforcer::new(
                Arc::new(UnsupportedShieldControl),
                clock,
                scope,
                settings,
            )),
        ),
    };

    info!(
        profile = %profile,
        model = %enforcer.model(),
        os = std::env::consts::OS,
        "platform adapters ready"
    );

    Ok(PlatformAdapters {
        profile,
        requirements: requirements_for(profile),
        permissions,
        usage: Arc::clone(&sampler) as Arc<dyn UsageSource>,
        sampler: Some(sampler),
        enforcer,
    })
}

#[cfg(target_os = "macos")]
fn native_process_table() -> Arc<dyn ProcessControl> {
    Arc::new(WorkspaceProcessTable)
}

#[cfg(not(target_os = "macos"))]
fn native_process_table() -> Arc<dyn ProcessControl> {
    Arc::new(SysinfoProcessControl::new())
}

#[cfg(target_os = "macos")]
fn macos_adapters(
    clock: Arc<dyn Clock>,
    scope: EnumerationScope,
    settings: LoopSettings,
) -> Result<(Arc<dyn PermissionProvider>, BlockEnforcer)> {
    Ok((
        Arc::new(AccessibilityPermissionProvider),
        BlockEnforcer::EventDriven(EventDrivenEnforcer::new(
            Arc::new(WorkspaceForegroundControl),
            clock,
            scope,
            settings,
        )),
    ))
}

#[cfg(not(target_os = "macos"))]
fn macos_adapters(
    _clock: Arc<dyn Clock>,
    _scope: EnumerationScope,
    _settings: LoopSettings,
) -> Result<(Arc<dyn PermissionProvider>, BlockEnforcer)> {
    Err(timeguard_domain::TimeguardError::Config(format!(
        "the macos platform profile cannot run on {}",
        std::env::consts::OS
    )))
}
