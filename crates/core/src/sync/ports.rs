//! Port interfaces for the persistence boundary
//!
//! Storage is owned elsewhere; the sync pipeline only writes apps and usage
//! and reads the declared block policy through these traits.

use async_trait::async_trait;
use timeguard_domain::{AppIdentity, AppMetadata, BlockDirective, Result, UsageRecord};

/// Trait for persisting discovered applications
#[async_trait]
pub trait AppRepository: Send + Sync {
    /// Insert or update an application. Calling it twice with the same
    /// identity must leave one row.
    async fn upsert_app(&self, app: &AppIdentity, metadata: &AppMetadata) -> Result<()>;
}

/// Trait for persisting per-day usage
#[async_trait]
pub trait UsageRepository: Send + Sync {
    /// Monotonic upsert keyed by `(app, date)`; see [`UsageRecord::merge`].
    async fn upsert_usage(&self, record: &UsageRecord) -> Result<()>;
}

/// Trait for reading the declared block policy
#[async_trait]
pub trait BlockPolicyRepository: Send + Sync {
    /// Every stored directive, expired ones included.
    async fn get_blocked_apps(&self) -> Result<Vec<BlockDirective>>;
}
