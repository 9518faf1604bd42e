//! Application identity types

use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::impl_wire_name_conversions;

/// Platform-stable application identifier.
///
/// Holds a package id, bundle id or process name depending on the platform.
/// Always case-normalized; identities from different platforms are never
/// assumed to be equivalent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AppId(String);

impl AppId {
    /// Normalize a raw identifier (trim + lowercase).
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_lowercase())
    }

    /// Normalize a process/executable name: additionally strips a trailing
    /// `.exe` so `Steam.exe` and `steam` name the same identity.
    pub fn from_process_name(raw: impl AsRef<str>) -> Self {
        let normalized = raw.as_ref().trim().to_lowercase();
        let stripped = normalized.strip_suffix(".exe").unwrap_or(&normalized);
        Self(stripped.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a process identity (see [`AppId::from_process_name`]) names
    /// this app. `steam.exe` and `steam` both match a `steam` process.
    pub fn matches_process(&self, process: &AppId) -> bool {
        self == process || Self::from_process_name(&self.0) == *process
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for AppId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AppId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl TryFrom<String> for AppId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let id = Self::new(value);
        if id.is_empty() {
            return Err("application identifier must not be empty".to_string());
        }
        Ok(id)
    }
}

impl From<AppId> for String {
    fn from(value: AppId) -> Self {
        value.0
    }
}

/// Coarse category tag attached to every identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppCategory {
    Social,
    Games,
    Entertainment,
    Productivity,
    Communication,
    Education,
    Utility,
    #[default]
    Other,
}

impl_wire_name_conversions!(AppCategory {
    Social => "social",
    Games => "games",
    Entertainment => "entertainment",
    Productivity => "productivity",
    Communication => "communication",
    Education => "education",
    Utility => "utility",
    Other => "other",
});

/// An application as seen by one platform.
///
/// Equality and hashing only consider [`AppId`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppIdentity {
    pub id: AppId,
    pub display_name: String,
    #[serde(default)]
    pub category: AppCategory,
}

impl AppIdentity {
    pub fn new(id: AppId, display_name: impl Into<String>, category: AppCategory) -> Self {
        Self { id, display_name: display_name.into(), category }
    }

    /// Identity known only by its identifier; the display name falls back to
    /// the raw id.
    pub fn bare(id: AppId) -> Self {
        let display_name = id.to_string();
        Self { id, display_name, category: AppCategory::Other }
    }
}

impl PartialEq for AppIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for AppIdentity {}

impl Hash for AppIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// How an application came to be known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoverySource {
    /// Returned by a full installed-application enumeration.
    Enumerated,
    /// Seen only in usage/foreground events.
    UsageEvents,
    /// Seen in the running process table.
    RunningProcess,
}

impl_wire_name_conversions!(DiscoverySource {
    Enumerated => "enumerated",
    UsageEvents => "usage_events",
    RunningProcess => "running_process",
});

/// Metadata passed to the app store alongside an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppMetadata {
    pub platform: String,
    pub source: DiscoverySource,
    pub discovered_at: DateTime<Utc>,
}
