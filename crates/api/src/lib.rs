//! # Timeguard App
//!
//! Application layer - context wiring, boundary commands and the daemon.
//!
//! This crate contains:
//! - Commands exposed to a settings UI (permission prompts, sync, services)
//! - Application context (dependency injection)
//! - Logging setup shared by the binary and tests
//!
//! ## Architecture
//! - Depends on `domain`, `core`, and `infra`
//! - Picks the platform profile from configuration and wires the engine

pub mod commands;
pub mod context;
pub mod utils;

// Re-export for convenience
pub use commands::*;
pub use context::*;
