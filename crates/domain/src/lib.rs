//! # Timeguard Domain
//!
//! Business domain types for the usage-tracking and app-blocking engine.
//!
//! This crate contains:
//! - Application identities, usage records and block directives
//! - Permission and capability models
//! - Domain error types and Result definitions
//! - Configuration structures and defaults
//!
//! ## Architecture
//! - No dependencies on other Timeguard crates
//! - Pure data structures; no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
