//! Periodic full re-sync

use std::sync::Arc;
use std::time::Duration;

use timeguard_core::SyncCoordinator;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Configuration for the re-sync scheduler
#[derive(Debug, Clone)]
pub struct ResyncSchedulerConfig {
    pub interval: Duration,
    pub join_timeout: Duration,
}

impl Default for ResyncSchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(timeguard_domain::constants::DEFAULT_RESYNC_INTERVAL_SECS),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Runs [`SyncCoordinator::full_sync`] every interval. The first run happens
/// one interval after `start`; callers do their own initial sync.
///
/// A permission denial is logged and retried next interval like any other
/// failure, since the user may grant the capability in the meantime.
pub struct ResyncScheduler {
    coordinator: Arc<SyncCoordinator>,
    config: ResyncSchedulerConfig,
    cancellation_token: CancellationToken,
    task_handle: TaskHandle,
}

impl ResyncScheduler {
    pub fn new(coordinator: Arc<SyncCoordinator>, config: ResyncSchedulerConfig) -> Self {
        Self {
            coordinator,
            config,
            cancellation_token: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
        }
    }

    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation_token = CancellationToken::new();

        let coordinator = Arc::clone(&self.coordinator);
        let interval = self.config.interval;
        let cancel = self.cancellation_token.clone();
        let handle = tokio::spawn(async move {
            Self::resync_loop(coordinator, interval, cancel).await;
        });
        *self.task_handle.lock().await = Some(handle);

        info!(interval_secs = interval.as_secs(), "resync scheduler started");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation_token.cancel();

        if let Some(handle) = self.task_handle.lock().await.take() {
            let duration = self.config.join_timeout;
            tokio::time::timeout(duration, handle)
                .await
                .map_err(|_| SchedulerError::Timeout { duration })??;
        }

        info!("resync scheduler stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.task_handle
            .try_lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    async fn resync_loop(
        coordinator: Arc<SyncCoordinator>,
        interval: Duration,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("resync loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    // A sync in flight when cancellation arrives is abandoned.
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        result = coordinator.full_sync() => match result {
                            Ok(report) => debug!(
                                apps = report.apps_upserted,
                                usage = report.usage_upserted,
                                warnings = report.warnings.len(),
                                "periodic sync finished"
                            ),
                            Err(err) => warn!(error = %err, "periodic sync stopped early"),
                        },
                    }
                }
            }
        }
    }
}
