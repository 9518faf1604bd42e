//! Configuration structures

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::types::PlatformProfile;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
    pub enforcement: EnforcementConfig,
    pub platform: PlatformConfig,
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: DEFAULT_DATABASE_PATH.to_string(), pool_size: DEFAULT_POOL_SIZE }
    }
}

/// Sync pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Days of usage re-read on each full sync.
    pub lookback_days: u32,
    /// Window used to derive the installed-app list on platforms that cannot
    /// enumerate.
    pub discovery_window_days: u32,
    pub resync_interval_secs: u64,
    pub usage_sample_interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            discovery_window_days: DEFAULT_DISCOVERY_WINDOW_DAYS,
            resync_interval_secs: DEFAULT_RESYNC_INTERVAL_SECS,
            usage_sample_interval_secs: DEFAULT_USAGE_SAMPLE_INTERVAL_SECS,
        }
    }
}

impl SyncConfig {
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs.max(1))
    }

    pub fn usage_sample_interval(&self) -> Duration {
        Duration::from_secs(self.usage_sample_interval_secs.max(1))
    }
}

/// Enforcement loop configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnforcementConfig {
    pub poll_interval_ms: u64,
    pub max_backoff_ms: u64,
    pub stop_timeout_ms: u64,
}

impl Default for EnforcementConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT_MS,
        }
    }
}

impl EnforcementConfig {
    /// Poll interval clamped to the supported range.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(
            self.poll_interval_ms.clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS),
        )
    }

    /// Upper bound for the failure backoff; never below the poll interval.
    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms).max(self.poll_interval())
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

/// Platform adapter selection
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub profile: PlatformProfile,
}
