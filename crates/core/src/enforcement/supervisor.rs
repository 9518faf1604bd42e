//! Enforcement loop handles and health tracking

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use timeguard_domain::{EnforcementModel, Result, TimeguardError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Counters shared between a loop task and anyone holding its handle.
#[derive(Debug, Default)]
pub struct LoopHealth {
    running: AtomicBool,
    ticks: AtomicU64,
    terminations: AtomicU64,
    failures: AtomicU64,
    consecutive_failures: AtomicU32,
    last_tick: Mutex<Option<DateTime<Utc>>>,
    last_error: Mutex<Option<String>>,
}

impl LoopHealth {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn terminations(&self) -> u64 {
        self.terminations.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    pub fn last_tick(&self) -> Option<DateTime<Utc>> {
        *self.last_tick.lock()
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    pub(crate) fn record_tick(&self, at: DateTime<Utc>) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        *self.last_tick.lock() = Some(at);
    }

    pub(crate) fn record_terminations(&self, count: u64) {
        self.terminations.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self, error: &TimeguardError) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
        *self.last_error.lock() = Some(error.to_string());
    }

    fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }
}

/// Clears the running flag when the loop future ends, panics included.
struct RunningFlag(Arc<LoopHealth>);

impl Drop for RunningFlag {
    fn drop(&mut self) {
        self.0.set_running(false);
    }
}

struct LoopInner {
    id: Uuid,
    model: EnforcementModel,
    token: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    health: Arc<LoopHealth>,
}

/// Handle to one enforcement loop.
///
/// Clones refer to the same loop. Passive handles (declarative shield) have
/// no task and stay alive until stopped.
#[derive(Clone)]
pub struct LoopHandle {
    inner: Arc<LoopInner>,
}

impl LoopHandle {
    /// Spawn `body` as a supervised task.
    pub fn spawn<F, Fut>(model: EnforcementModel, body: F) -> Self
    where
        F: FnOnce(CancellationToken, Arc<LoopHealth>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let health = Arc::new(LoopHealth::default());
        health.set_running(true);

        let flag = RunningFlag(Arc::clone(&health));
        let fut = body(token.clone(), Arc::clone(&health));
        let task = tokio::spawn(async move {
            let _flag = flag;
            fut.await;
        });

        let handle = Self::from_parts(model, token, Some(task), health);
        info!(loop_id = %handle.id(), model = %model, "enforcement loop started");
        handle
    }

    /// Healthy handle with no background task.
    pub fn passive(model: EnforcementModel) -> Self {
        let health = Arc::new(LoopHealth::default());
        health.set_running(true);
        Self::from_parts(model, CancellationToken::new(), None, health)
    }

    fn from_parts(
        model: EnforcementModel,
        token: CancellationToken,
        task: Option<JoinHandle<()>>,
        health: Arc<LoopHealth>,
    ) -> Self {
        Self {
            inner: Arc::new(LoopInner {
                id: Uuid::now_v7(),
                model,
                token,
                task: Mutex::new(task),
                health,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn model(&self) -> EnforcementModel {
        self.inner.model
    }

    pub fn health(&self) -> &LoopHealth {
        &self.inner.health
    }

    /// Not cancelled, and the task (if any) has not exited.
    pub fn is_alive(&self) -> bool {
        if self.inner.token.is_cancelled() {
            return false;
        }
        match self.inner.task.lock().as_ref() {
            Some(task) => !task.is_finished(),
            None => self.inner.health.is_running(),
        }
    }

    /// Cancel the loop and wait up to `timeout` for it to exit.
    ///
    /// A loop that misses the deadline is aborted. Stopping twice is a no-op.
    pub async fn stop(&self, timeout: Duration) -> Result<()> {
        self.inner.token.cancel();
        let task = self.inner.task.lock().take();

        let Some(task) = task else {
            self.inner.health.set_running(false);
            return Ok(());
        };

        let abort = task.abort_handle();
        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(())) => {
                debug!(loop_id = %self.id(), "enforcement loop stopped");
                Ok(())
            }
            Ok(Err(join_err)) if join_err.is_cancelled() => Ok(()),
            Ok(Err(join_err)) => {
                Err(TimeguardError::Internal(format!("enforcement loop panicked: {join_err}")))
            }
            Err(_) => {
                abort.abort();
                warn!(loop_id = %self.id(), timeout_ms = timeout.as_millis() as u64, "enforcement loop did not stop in time; aborted");
                Err(TimeguardError::Internal(format!(
                    "enforcement loop did not stop within {timeout:?}"
                )))
            }
        }
    }
}

/// The single loop a strategy owns.
///
/// `start_lock` is held across loop setup so concurrent `start_loop` calls
/// cannot register two loops.
#[derive(Default)]
pub(crate) struct LoopSlot {
    start_lock: tokio::sync::Mutex<()>,
    current: Mutex<Option<LoopHandle>>,
}

impl LoopSlot {
    /// Return the live loop, or start one with `start`.
    pub(crate) async fn get_or_start<F, Fut>(&self, start: F) -> Result<LoopHandle>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<LoopHandle>>,
    {
        let _starting = self.start_lock.lock().await;
        if let Some(handle) = self.live() {
            debug!(loop_id = %handle.id(), "enforcement loop already running");
            return Ok(handle);
        }

        let handle = start().await?;
        *self.current.lock() = Some(handle.clone());
        Ok(handle)
    }

    /// Stop `handle` and forget it if it is the current loop.
    pub(crate) async fn stop(&self, handle: &LoopHandle, timeout: Duration) -> Result<()> {
        let result = handle.stop(timeout).await;
        let mut current = self.current.lock();
        if current.as_ref().is_some_and(|c| c.id() == handle.id()) {
            *current = None;
        }
        result
    }

    /// The current loop if it is still alive.
    pub(crate) fn live(&self) -> Option<LoopHandle> {
        self.current.lock().as_ref().filter(|handle| handle.is_alive()).cloned()
    }
}

impl std::fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopHandle")
            .field("id", &self.inner.id)
            .field("model", &self.inner.model)
            .field("alive", &self.is_alive())
            .finish()
    }
}
