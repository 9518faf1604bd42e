//! # Timeguard Core
//!
//! Pure engine logic - no OS, database or UI code.
//!
//! This crate contains:
//! - The permission state machine ([`permission`])
//! - Usage discovery and per-day aggregation ([`usage`])
//! - The three block enforcement strategies and their loops ([`enforcement`])
//! - The sync pipeline that ties them together ([`sync`])
//!
//! ## Architecture Principles
//! - Only depends on `timeguard-domain`
//! - Every platform or storage concern sits behind a port trait
//! - Time is read through [`time::Clock`] so tests control it

pub mod enforcement;
pub mod permission;
pub mod sync;
pub mod time;
pub mod usage;

// Re-export specific items to avoid ambiguity
pub use enforcement::ports::{
    ForegroundControl, ForegroundSubscription, ProcessControl, RunningProcess, ShieldControl,
};
pub use enforcement::{
    BlockEnforcer, DirectiveSet, EventDrivenEnforcer, LoopHandle, LoopHealth, LoopSettings,
    PollAndKillEnforcer, ShieldEnforcer,
};
pub use permission::{PermissionGate, PermissionProvider};
pub use sync::ports::{AppRepository, BlockPolicyRepository, UsageRepository};
pub use sync::{SyncCoordinator, SyncReport, SyncSettings};
pub use time::{Clock, ManualClock, SystemClock};
pub use usage::{UsageAggregator, UsageCollector, UsageSource, UsageZone};
