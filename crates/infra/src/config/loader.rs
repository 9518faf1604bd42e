//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Environment variables, when `TIMEGUARD_DB_PATH` is set
//! 2. Otherwise the first config file found by [`probe_config_paths`]
//! 3. Otherwise built-in defaults
//!
//! ## Environment Variables
//! - `TIMEGUARD_DB_PATH`: Database file path (required for env loading)
//! - `TIMEGUARD_DB_POOL_SIZE`: Connection pool size
//! - `TIMEGUARD_LOOKBACK_DAYS`: Days of usage re-read per sync
//! - `TIMEGUARD_DISCOVERY_WINDOW_DAYS`: Usage-derived discovery window
//! - `TIMEGUARD_RESYNC_INTERVAL_SECS`: Seconds between periodic full syncs
//! - `TIMEGUARD_USAGE_SAMPLE_INTERVAL_SECS`: Process usage sampling interval
//! - `TIMEGUARD_POLL_INTERVAL_MS`: Poll-and-kill interval
//! - `TIMEGUARD_MAX_BACKOFF_MS`: Upper bound of the failure backoff
//! - `TIMEGUARD_STOP_TIMEOUT_MS`: How long stop waits for a loop to exit
//! - `TIMEGUARD_PLATFORM`: `desktop`, `macos` or `shield`
//!
//! Unset optional variables keep their defaults.
//!
//! ## File Locations
//! `config.{json,toml}` and `timeguard.{json,toml}` in the current directory,
//! its two parents, and next to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use timeguard_domain::{Config, PlatformProfile, Result, TimeguardError};

const DB_PATH_VAR: &str = "TIMEGUARD_DB_PATH";

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `TimeguardError::Config` if a source is present but invalid:
/// a malformed variable or an unparsable config file.
pub fn load() -> Result<Config> {
    if std::env::var_os(DB_PATH_VAR).is_some() {
        let config = load_from_env()?;
        tracing::info!("configuration loaded from environment variables");
        return Ok(config);
    }

    match probe_config_paths() {
        Some(path) => load_from_file(Some(path)),
        None => {
            tracing::info!("no config file found; using defaults");
            Ok(Config::default())
        }
    }
}

/// Load configuration from environment variables
///
/// `TIMEGUARD_DB_PATH` must be set; every other variable is optional.
///
/// # Errors
/// Returns `TimeguardError::Config` if the database path is missing or a
/// variable has an invalid value.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();

    config.database.path = env_var(DB_PATH_VAR)?;
    if let Some(size) = env_parse::<u32>("TIMEGUARD_DB_POOL_SIZE")? {
        config.database.pool_size = size;
    }

    if let Some(days) = env_parse::<u32>("TIMEGUARD_LOOKBACK_DAYS")? {
        config.sync.lookback_days = days;
    }
    if let Some(days) = env_parse::<u32>("TIMEGUARD_DISCOVERY_WINDOW_DAYS")? {
        config.sync.discovery_window_days = days;
    }
    if let Some(secs) = env_parse::<u64>("TIMEGUARD_RESYNC_INTERVAL_SECS")? {
        config.sync.resync_interval_secs = secs;
    }
    if let Some(secs) = env_parse::<u64>("TIMEGUARD_USAGE_SAMPLE_INTERVAL_SECS")? {
        config.sync.usage_sample_interval_secs = secs;
    }

    if let Some(ms) = env_parse::<u64>("TIMEGUARD_POLL_INTERVAL_MS")? {
        config.enforcement.poll_interval_ms = ms;
    }
    if let Some(ms) = env_parse::<u64>("TIMEGUARD_MAX_BACKOFF_MS")? {
        config.enforcement.max_backoff_ms = ms;
    }
    if let Some(ms) = env_parse::<u64>("TIMEGUARD_STOP_TIMEOUT_MS")? {
        config.enforcement.stop_timeout_ms = ms;
    }

    if let Some(profile) = env_parse::<PlatformProfile>("TIMEGUARD_PLATFORM")? {
        config.platform.profile = profile;
    }

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. Supports JSON and
/// TOML (detected by extension); missing sections keep their defaults.
///
/// # Errors
/// Returns `TimeguardError::Config` if the file cannot be found or read, or
/// its contents are invalid.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(TimeguardError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            TimeguardError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| TimeguardError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| TimeguardError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| TimeguardError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(TimeguardError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// Returns the first existing candidate, or `None`.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidates_in(&cwd));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidates_in(exe_dir));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn candidates_in(dir: &Path) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for base in [dir.to_path_buf(), dir.join(".."), dir.join("../..")] {
        for name in ["config.json", "config.toml", "timeguard.json", "timeguard.toml"] {
            paths.push(base.join(name));
        }
    }
    paths
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        TimeguardError::Config(format!("Missing required environment variable: {key}"))
    })
}

/// Parse an optional variable. Unset or empty reads as `None`.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| TimeguardError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(None),
    }
}
