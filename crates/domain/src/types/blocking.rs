//! Block policy and enforcement state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::app::AppId;

/// Declared intent to block an application, independent of whether the OS
/// honours it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockDirective {
    pub app: AppId,
    /// `None` blocks until the directive is removed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl BlockDirective {
    pub fn until(app: AppId, expires_at: DateTime<Utc>) -> Self {
        Self { app, expires_at: Some(expires_at) }
    }

    pub fn indefinite(app: AppId) -> Self {
        Self { app, expires_at: None }
    }

    /// A directive is active strictly before its expiry instant.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |expiry| now < expiry)
    }
}

/// Engine's derived belief about whether a directive is being honoured.
///
/// Rebuilt every enforcement cycle; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum EnforcementState {
    Unenforced,
    Enforced,
    EnforcementFailed(String),
}

impl EnforcementState {
    pub fn is_enforced(&self) -> bool {
        matches!(self, Self::Enforced)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Unenforced => "unenforced",
            Self::Enforced => "enforced",
            Self::EnforcementFailed(_) => "enforcement_failed",
        }
    }
}
