//! Application constants
//!
//! Centralized location for domain-level defaults and limits.

// Sync windows
pub const DEFAULT_LOOKBACK_DAYS: u32 = 7;
pub const DEFAULT_DISCOVERY_WINDOW_DAYS: u32 = 30;
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_USAGE_SAMPLE_INTERVAL_SECS: u64 = 15;

// Enforcement loop
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
pub const MIN_POLL_INTERVAL_MS: u64 = 250;
pub const MAX_POLL_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 30_000;
pub const DEFAULT_STOP_TIMEOUT_MS: u64 = 5_000;

// Storage
pub const DEFAULT_DATABASE_PATH: &str = "timeguard.db";
pub const DEFAULT_POOL_SIZE: u32 = 4;

/// Env var selecting JSON log output.
pub const LOG_FORMAT_ENV: &str = "TIMEGUARD_LOG_FORMAT";
