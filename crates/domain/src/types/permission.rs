//! Permission and authorization state

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::impl_wire_name_conversions;

/// An OS-level grant the engine may need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    UsageStatistics,
    Accessibility,
    ScreenTimeAuthorization,
    ProcessControl,
}

impl_wire_name_conversions!(Capability {
    UsageStatistics => "usage_statistics",
    Accessibility => "accessibility",
    ScreenTimeAuthorization => "screen_time_authorization",
    ProcessControl => "process_control",
});

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::UsageStatistics,
        Capability::Accessibility,
        Capability::ScreenTimeAuthorization,
        Capability::ProcessControl,
    ];
}

/// Per-capability authorization state.
///
/// `NotDetermined → Requesting → {Approved, Denied}`; a denied capability may
/// be re-requested, and a fresh check may observe an approval granted outside
/// the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    #[default]
    NotDetermined,
    Requesting,
    Approved,
    Denied,
}

impl_wire_name_conversions!(PermissionState {
    NotDetermined => "not_determined",
    Requesting => "requesting",
    Approved => "approved",
    Denied => "denied",
});

impl PermissionState {
    pub fn is_approved(self) -> bool {
        matches!(self, Self::Approved)
    }
}

/// Terminal result of a permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionOutcome {
    Granted,
    Denied,
}

impl PermissionOutcome {
    pub fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

impl From<PermissionOutcome> for PermissionState {
    fn from(outcome: PermissionOutcome) -> Self {
        match outcome {
            PermissionOutcome::Granted => Self::Approved,
            PermissionOutcome::Denied => Self::Denied,
        }
    }
}

/// What a caller wants to do; each maps to a platform-specific capability set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    UsageTracking,
    Blocking,
}

impl_wire_name_conversions!(Requirement {
    UsageTracking => "usage_tracking",
    Blocking => "blocking",
});

/// Capabilities each requirement needs on the current platform.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequirementMap {
    pub usage_tracking: Vec<Capability>,
    pub blocking: Vec<Capability>,
}

impl RequirementMap {
    pub fn capabilities_for(&self, requirement: Requirement) -> &[Capability] {
        match requirement {
            Requirement::UsageTracking => &self.usage_tracking,
            Requirement::Blocking => &self.blocking,
        }
    }

    /// Every capability named by any requirement, deduplicated and ordered.
    pub fn all_capabilities(&self) -> Vec<Capability> {
        let mut caps: Vec<Capability> =
            self.usage_tracking.iter().chain(self.blocking.iter()).copied().collect();
        caps.sort();
        caps.dedup();
        caps
    }
}

/// Snapshot of every capability's state plus derived readiness flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionStatus {
    pub states: BTreeMap<Capability, PermissionState>,
    pub ready_for_usage_tracking: bool,
    pub ready_for_blocking: bool,
    pub checked_at: Option<DateTime<Utc>>,
}

impl PermissionStatus {
    /// All capabilities `NotDetermined`, never checked.
    pub fn initial(requirements: &RequirementMap) -> Self {
        let states = requirements
            .all_capabilities()
            .into_iter()
            .map(|cap| (cap, PermissionState::NotDetermined))
            .collect();
        Self::derive(states, requirements, None)
    }

    /// Build a status, computing readiness from `states`.
    pub fn derive(
        states: BTreeMap<Capability, PermissionState>,
        requirements: &RequirementMap,
        checked_at: Option<DateTime<Utc>>,
    ) -> Self {
        let ready = |req: Requirement| {
            requirements.capabilities_for(req).iter().all(|cap| {
                states.get(cap).copied().unwrap_or_default().is_approved()
            })
        };
        Self {
            ready_for_usage_tracking: ready(Requirement::UsageTracking),
            ready_for_blocking: ready(Requirement::Blocking),
            states,
            checked_at,
        }
    }

    pub fn state_of(&self, capability: Capability) -> PermissionState {
        self.states.get(&capability).copied().unwrap_or_default()
    }

    pub fn is_ready(&self, requirement: Requirement) -> bool {
        match requirement {
            Requirement::UsageTracking => self.ready_for_usage_tracking,
            Requirement::Blocking => self.ready_for_blocking,
        }
    }
}
