//! Interval scheduler that samples the process table into the usage log

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::platform::{ProcessUsageSource, SampleSummary};
use crate::scheduling::error::{SchedulerError, SchedulerResult};

type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Configuration for the usage sampler
#[derive(Debug, Clone)]
pub struct UsageSamplerConfig {
    pub interval: Duration,
    /// How long `stop` waits for the task after cancelling it.
    pub join_timeout: Duration,
}

impl Default for UsageSamplerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(timeguard_domain::constants::DEFAULT_USAGE_SAMPLE_INTERVAL_SECS),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Calls [`ProcessUsageSource::sample`] once immediately and then every
/// interval until stopped. Sampling failures are logged and retried on the
/// next tick.
pub struct UsageSampler {
    source: Arc<ProcessUsageSource>,
    config: UsageSamplerConfig,
    cancellation_token: CancellationToken,
    task_handle: TaskHandle,
}

impl UsageSampler {
    pub fn new(source: Arc<ProcessUsageSource>, config: UsageSamplerConfig) -> Self {
        Self {
            source,
            config,
            cancellation_token: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
        }
    }

    /// # Errors
    ///
    /// Returns [`SchedulerError::AlreadyRunning`] if the sampler is running.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        // Fresh token so a stopped sampler can be restarted.
        self.cancellation_token = CancellationToken::new();

        let source = Arc::clone(&self.source);
        let interval = self.config.interval;
        let cancel = self.cancellation_token.clone();
        let handle = tokio::spawn(async move {
            Self::sample_loop(source, interval, cancel).await;
        });
        *self.task_handle.lock().await = Some(handle);

        info!(interval_secs = interval.as_secs(), "usage sampler started");
        Ok(())
    }

    /// Take one sample now, outside the periodic task.
    ///
    /// The daemon calls this before its first sync so the usage log is not
    /// empty when that sync runs.
    pub async fn sample_now(&self) -> timeguard_domain::Result<SampleSummary> {
        self.source.sample().await
    }

    /// Cancel the task and wait for it under the join timeout.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NotRunning`] if the sampler was not started,
    /// or a timeout/join error if the task does not finish cleanly.
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

        info!("usage sampler stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.task_handle
            .try_lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    async fn sample_loop(
        source: Arc<ProcessUsageSource>,
        interval: Duration,
        cancel: CancellationToken,
    ) {
        loop {
            if let Err(err) = source.sample().await {
                warn!(error = %err, "usage sample failed; retrying next tick");
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("usage sampler cancelled");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }
}
