//! Domain types and models

pub mod app;
pub mod blocking;
pub mod capability;
pub mod permission;
pub mod usage;

pub use app::{AppCategory, AppId, AppIdentity, AppMetadata, DiscoverySource};
pub use blocking::{BlockDirective, EnforcementState};
pub use capability::{
    CapabilityDescriptor, EnforcementLatency, EnforcementModel, EnumerationScope, PlatformProfile,
};
pub use permission::{
    Capability, PermissionOutcome, PermissionState, PermissionStatus, Requirement, RequirementMap,
};
pub use usage::{TransitionEvent, TransitionKind, UsageKey, UsageRecord};
