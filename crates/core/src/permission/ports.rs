//! Port interface for OS permission APIs

use async_trait::async_trait;
use timeguard_domain::{Capability, PermissionOutcome, PermissionState, Result};

/// Platform side of the permission state machine.
///
/// Implementations talk to the OS only; caching, single-flight and
/// fail-closed behaviour live in [`super::PermissionGate`].
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    /// Read the OS's current answer for `capability` without prompting.
    ///
    /// Must not return [`PermissionState::Requesting`].
    async fn check(&self, capability: Capability) -> Result<PermissionState>;

    /// Prompt the user (or OS) for `capability`. May suspend indefinitely
    /// while the user decides.
    async fn request(&self, capability: Capability) -> Result<PermissionOutcome>;
}
