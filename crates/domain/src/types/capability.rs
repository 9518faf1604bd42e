//! Capability descriptors for the three enforcement models

use serde::{Deserialize, Serialize};

use crate::impl_wire_name_conversions;

/// How the OS lets us block an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementModel {
    /// Foreground notifications; we react by returning to the home screen.
    EventDriven,
    /// The OS enforces a shield set once told which ids to block.
    DeclarativeShield,
    /// No native primitive; running processes are detected and terminated.
    PollAndKill,
}

impl_wire_name_conversions!(EnforcementModel {
    EventDriven => "event_driven",
    DeclarativeShield => "declarative_shield",
    PollAndKill => "poll_and_kill",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementLatency {
    Immediate,
    /// Bounded by the poll interval.
    Bounded,
    BestEffort,
}

impl_wire_name_conversions!(EnforcementLatency {
    Immediate => "immediate",
    Bounded => "bounded",
    BestEffort => "best_effort",
});

/// Whether the platform can list every installed app or only those seen in
/// usage events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumerationScope {
    Full,
    UsageDerived,
}

impl_wire_name_conversions!(EnumerationScope {
    Full => "full",
    UsageDerived => "usage_derived",
});

/// What a given enforcement strategy can and cannot guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub model: EnforcementModel,
    pub requires_polling: bool,
    pub latency: EnforcementLatency,
    pub enumeration: EnumerationScope,
}

impl CapabilityDescriptor {
    pub const fn declarative_shield(enumeration: EnumerationScope) -> Self {
        Self {
            model: EnforcementModel::DeclarativeShield,
            requires_polling: false,
            latency: EnforcementLatency::Immediate,
            enumeration,
        }
    }

    pub const fn event_driven(enumeration: EnumerationScope) -> Self {
        Self {
            model: EnforcementModel::EventDriven,
            requires_polling: false,
            latency: EnforcementLatency::BestEffort,
            enumeration,
        }
    }

    pub const fn poll_and_kill(enumeration: EnumerationScope) -> Self {
        Self {
            model: EnforcementModel::PollAndKill,
            requires_polling: true,
            latency: EnforcementLatency::Bounded,
            enumeration,
        }
    }
}

/// Named bundle of adapters selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformProfile {
    /// Process table polling with termination.
    Desktop,
    /// NSWorkspace activation notifications.
    Macos,
    /// Declarative OS shield.
    Shield,
}

impl_wire_name_conversions!(PlatformProfile {
    Desktop => "desktop",
    Macos => "macos",
    Shield => "shield",
});

impl PlatformProfile {
    /// Profile matching the compilation target.
    pub fn native() -> Self {
        if cfg!(target_os = "macos") {
            Self::Macos
        } else {
            Self::Desktop
        }
    }

    pub fn enforcement_model(self) -> EnforcementModel {
        match self {
            Self::Desktop => EnforcementModel::PollAndKill,
            Self::Macos => EnforcementModel::EventDriven,
            Self::Shield => EnforcementModel::DeclarativeShield,
        }
    }
}

impl Default for PlatformProfile {
    fn default() -> Self {
        Self::native()
    }
}
