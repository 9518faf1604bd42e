//! Port interfaces for the three OS blocking models
//!
//! Each strategy talks to the OS through exactly one of these traits.
//! Adapters own their own I/O timeouts.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use timeguard_domain::{AppId, BlockDirective, Result};
use tokio::sync::mpsc;

/// Declarative OS shield: the OS blocks whatever set it was last given.
#[async_trait]
pub trait ShieldControl: Send + Sync {
    /// Replace the whole shielded set in one call. Expiry instants are passed
    /// through so the OS can lift them on its own.
    ///
    /// Returns `CapabilityUnavailable` on platforms without a shield API.
    async fn replace_shield(&self, directives: &[BlockDirective]) -> Result<()>;
}

/// Foreground notifications plus a "go home" action.
#[async_trait]
pub trait ForegroundControl: Send + Sync {
    /// Register for foreground transitions. The registration lives exactly
    /// as long as the returned subscription.
    async fn subscribe(&self) -> Result<ForegroundSubscription>;

    /// Move the user away from `app` (home screen, launcher, or hide it).
    async fn return_to_home(&self, app: &AppId) -> Result<()>;
}

/// Process table access for poll-and-kill.
#[async_trait]
pub trait ProcessControl: Send + Sync {
    async fn running_processes(&self) -> Result<Vec<RunningProcess>>;

    async fn terminate(&self, process: &RunningProcess) -> Result<()>;
}

/// One entry of the OS process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningProcess {
    pub pid: u32,
    pub app: AppId,
    pub name: String,
    pub started_at: Option<DateTime<Utc>>,
}

impl RunningProcess {
    pub fn new(pid: u32, name: impl Into<String>) -> Self {
        let name = name.into();
        Self { pid, app: AppId::from_process_name(&name), name, started_at: None }
    }

    pub fn started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }
}

/// Scoped foreground registration.
///
/// Dropping the subscription runs the adapter's release hook, so the OS
/// monitor is deregistered on every exit path of the owning task.
pub struct ForegroundSubscription {
    events: mpsc::Receiver<AppId>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl ForegroundSubscription {
    pub fn new(events: mpsc::Receiver<AppId>, release: impl FnOnce() + Send + 'static) -> Self {
        Self { events, release: Some(Box::new(release)) }
    }

    /// Next foregrounded app; `None` once the adapter stops emitting.
    pub async fn recv(&mut self) -> Option<AppId> {
        self.events.recv().await
    }
}

impl Drop for ForegroundSubscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for ForegroundSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForegroundSubscription")
            .field("released", &self.release.is_none())
            .finish()
    }
}
