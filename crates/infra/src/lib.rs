//! # Timeguard Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - SQLite repositories (r2d2 pool over rusqlite)
//! - Platform adapters per profile (process table, NSWorkspace, shield)
//! - Configuration loading from env vars and config files
//! - Background schedulers (usage sampling, periodic re-sync)
//!
//! ## Architecture
//! - Implements traits defined in `timeguard-core`
//! - Contains all "impure" code (I/O, OS APIs)

pub mod config;
pub mod database;
pub mod errors;
pub mod platform;
pub mod scheduling;

// Re-export commonly used items
pub use database::*;
pub use errors::InfraError;
pub use platform::{build_platform, requirements_for, PlatformAdapters, ProcessUsageSource};
pub use scheduling::{ResyncScheduler, ResyncSchedulerConfig, UsageSampler, UsageSamplerConfig};
