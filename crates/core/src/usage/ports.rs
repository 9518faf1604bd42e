//! Port interface for platform usage data

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use timeguard_domain::{AppIdentity, DiscoverySource, EnumerationScope, Result, TransitionEvent};

/// Platform adapter that enumerates applications and yields raw foreground
/// transitions.
#[async_trait]
pub trait UsageSource: Send + Sync {
    /// Whether [`installed_apps`](Self::installed_apps) can list everything.
    fn enumeration_scope(&self) -> EnumerationScope;

    /// How identities produced by this source were discovered.
    fn discovery_source(&self) -> DiscoverySource {
        match self.enumeration_scope() {
            EnumerationScope::Full => DiscoverySource::Enumerated,
            EnumerationScope::UsageDerived => DiscoverySource::UsageEvents,
        }
    }

    /// Full installed-application list. Only called when the scope is
    /// [`EnumerationScope::Full`].
    async fn installed_apps(&self) -> Result<Vec<AppIdentity>>;

    /// Transition events with `start <= at < end`, in any order.
    async fn transition_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TransitionEvent>>;
}
