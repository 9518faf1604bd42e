//! Error types used throughout the engine

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Timeguard
///
/// The first four variants form the enforcement taxonomy; the remaining ones
/// cover ambient plumbing (repositories, configuration, adapters).
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum TimeguardError {
    /// The user declined, or OS policy forbids, a capability. Never retried
    /// automatically.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The platform or OS version lacks the feature. Permanent.
    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// A single OS call failed; retried on the next natural cycle.
    #[error("Transient platform failure: {0}")]
    TransientPlatform(String),

    /// Some identities in a batch could not be enforced.
    #[error("Partial enforcement failure: {0}")]
    PartialEnforcement(String),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TimeguardError {
    /// Errors that stop a sync pipeline outright.
    pub fn is_hard_stop(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }

    /// Errors worth retrying on the next enforcement tick or sync cycle.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientPlatform(_) | Self::PartialEnforcement(_) | Self::Repository(_))
    }

    /// Stable label for logs and diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::PermissionDenied(_) => "permission_denied",
            Self::CapabilityUnavailable(_) => "capability_unavailable",
            Self::TransientPlatform(_) => "transient_platform",
            Self::PartialEnforcement(_) => "partial_enforcement",
            Self::Repository(_) => "repository",
            Self::Config(_) => "config",
            Self::Platform(_) => "platform",
            Self::NotFound(_) => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::Internal(_) => "internal",
        }
    }
}

/// Result type alias for Timeguard operations
pub type Result<T> = std::result::Result<T, TimeguardError>;
