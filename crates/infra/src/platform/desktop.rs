//! Desktop adapters backed by the OS process table

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use sysinfo::{Pid, ProcessesToUpdate, System};
use timeguard_core::{PermissionProvider, ProcessControl, RunningProcess};
use timeguard_domain::{
    AppId, Capability, PermissionOutcome, PermissionState, Result, TimeguardError,
};
use tokio::task;
use tracing::{debug, instrument};

use crate::errors::conversions::to_domain;

const PROCESS_IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Process table access through `sysinfo`.
///
/// Every refresh runs on the blocking pool under a timeout. The engine's own
/// process and kernel threads are never listed.
#[derive(Clone)]
pub struct SysinfoProcessControl {
    system: Arc<Mutex<System>>,
    self_pid: Option<u32>,
    timeout: Duration,
}

impl SysinfoProcessControl {
    pub fn new() -> Self {
        Self::with_timeout(PROCESS_IO_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            system: Arc::new(Mutex::new(System::new())),
            self_pid: sysinfo::get_current_pid().ok().map(|pid| pid.as_u32()),
            timeout,
        }
    }

    async fn blocking<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut System) -> Result<T> + Send + 'static,
    {
        let system = Arc::clone(&self.system);
        let job = task::spawn_blocking(move || {
            let mut guard = system.lock();
            f(&mut guard)
        });

        match tokio::time::timeout(self.timeout, job).await {
            Ok(joined) => joined.map_err(to_domain)?,
            Err(_) => Err(TimeguardError::TransientPlatform(format!(
                "{op} timed out after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }
}

impl Default for SysinfoProcessControl {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SysinfoProcessControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SysinfoProcessControl").field("timeout", &self.timeout).finish()
    }
}

#[async_trait]
impl ProcessControl for SysinfoProcessControl {
    #[instrument(skip(self))]
    async fn running_processes(&self) -> Result<Vec<RunningProcess>> {
        let self_pid = self.self_pid;
        let processes = self
            .blocking("process listing", move |system| {
                system.refresh_processes(ProcessesToUpdate::All, true);
                let listed = system
                    .processes()
                    .iter()
                    .filter(|(pid, process)| {
                        process.thread_kind().is_none() && Some(pid.as_u32()) != self_pid
                    })
                    .filter_map(|(pid, process)| {
                        let name = process.name().to_string_lossy().into_owned();
                        let entry = RunningProcess::new(pid.as_u32(), name);
                        if entry.app.is_empty() {
                            return None;
                        }
                        Some(match started_at(process.start_time()) {
                            Some(at) => entry.started_at(at),
                            None => entry,
                        })
                    })
                    .collect::<Vec<_>>();
                Ok(listed)
            })
            .await?;

        debug!(count = processes.len(), "listed running processes");
        Ok(processes)
    }

    #[instrument(skip(self, process), fields(pid = process.pid, app_id = %process.app))]
    async fn terminate(&self, process: &RunningProcess) -> Result<()> {
        let target = process.clone();
        self.blocking("process termination", move |system| {
            let pid = Pid::from_u32(target.pid);
            system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

            let Some(live) = system.process(pid) else {
                debug!("process already exited");
                return Ok(());
            };

            // The pid may have been reused since the listing.
            if AppId::from_process_name(live.name().to_string_lossy()) != target.app {
                debug!("pid now belongs to a different program; skipping");
                return Ok(());
            }

            if live.kill() {
                Ok(())
            } else {
                Err(TimeguardError::Platform(format!(
                    "failed to terminate pid {} ({})",
                    target.pid, target.name
                )))
            }
        })
        .await
    }
}

fn started_at(epoch_secs: u64) -> Option<DateTime<Utc>> {
    let secs = i64::try_from(epoch_secs).ok().filter(|s| *s > 0)?;
    Utc.timestamp_opt(secs, 0).single()
}

/// Permission provider for platforms where the engine needs no user grant.
///
/// Capabilities in the granted set are always approved; anything else is
/// denied without prompting.
#[derive(Debug, Clone, Default)]
pub struct StaticPermissionProvider {
    granted: BTreeSet<Capability>,
}

impl StaticPermissionProvider {
    pub fn granting(capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self { granted: capabilities.into_iter().collect() }
    }

    /// Process-table usage and termination, both available to any user
    /// process on desktop systems.
    pub fn desktop() -> Self {
        Self::granting([Capability::UsageStatistics, Capability::ProcessControl])
    }
}

#[async_trait]
impl PermissionProvider for StaticPermissionProvider {
    async fn check(&self, capability: Capability) -> Result<PermissionState> {
        Ok(if self.granted.contains(&capability) {
            PermissionState::Approved
        } else {
            PermissionState::Denied
        })
    }

    async fn request(&self, capability: Capability) -> Result<PermissionOutcome> {
        Ok(if self.granted.contains(&capability) {
            PermissionOutcome::Granted
        } else {
            PermissionOutcome::Denied
        })
    }
}
