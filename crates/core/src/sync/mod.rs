//! Sync pipeline: permissions, discovery, usage, policy, enforcement

pub mod coordinator;
pub mod ports;

pub use coordinator::{SyncCoordinator, SyncReport, SyncSettings};
pub use ports::{AppRepository, BlockPolicyRepository, UsageRepository};
