//! Poll-and-kill strategy for platforms without a blocking primitive

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use timeguard_domain::constants::{MAX_POLL_INTERVAL_MS, MIN_POLL_INTERVAL_MS};
use timeguard_domain::{
    AppId, BlockDirective, CapabilityDescriptor, EnforcementModel, EnforcementState,
    EnumerationScope, Result, TimeguardError,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::backoff::Backoff;
use super::directives::{DirectiveBoard, DirectiveSet, EnforcementLedger};
use super::ports::ProcessControl;
use super::supervisor::{LoopHandle, LoopHealth, LoopSlot};
use super::LoopSettings;
use crate::time::Clock;

/// Lists running processes every tick and terminates the ones under an
/// active directive.
///
/// Nothing prevents a watchdog from relaunching a killed process between
/// ticks; each tick simply tries again.
pub struct PollAndKillEnforcer {
    ctx: Arc<PollContext>,
    enumeration: EnumerationScope,
    settings: LoopSettings,
    loop_slot: LoopSlot,
}

struct PollContext {
    control: Arc<dyn ProcessControl>,
    clock: Arc<dyn Clock>,
    board: DirectiveBoard,
    ledger: EnforcementLedger,
}

impl PollAndKillEnforcer {
    pub fn new(
        control: Arc<dyn ProcessControl>,
        clock: Arc<dyn Clock>,
        enumeration: EnumerationScope,
        settings: LoopSettings,
    ) -> Self {
        let ctx = PollContext {
            control,
            clock,
            board: DirectiveBoard::new(),
            ledger: EnforcementLedger::new(),
        };
        Self { ctx: Arc::new(ctx), enumeration, settings, loop_slot: LoopSlot::default() }
    }

    pub fn descriptor(&self) -> CapabilityDescriptor {
        CapabilityDescriptor::poll_and_kill(self.enumeration)
    }

    pub async fn apply(&self, directives: Vec<BlockDirective>) -> Result<()> {
        self.publish(DirectiveSet::new(directives));
        Ok(())
    }

    pub async fn remove(&self, app: &AppId) -> Result<()> {
        self.publish(self.ctx.board.snapshot().without(app));
        Ok(())
    }

    pub fn currently_enforced(&self) -> Vec<AppId> {
        self.ctx.ledger.enforced(&self.ctx.board.snapshot(), self.ctx.clock.now())
    }

    pub fn enforcement_states(&self) -> BTreeMap<AppId, EnforcementState> {
        self.ctx.ledger.states(&self.ctx.board.snapshot(), self.ctx.clock.now())
    }

    /// Start the periodic task. `interval` is clamped to the supported range.
    #[instrument(skip(self))]
    pub async fn start_loop(&self, interval: Duration) -> Result<LoopHandle> {
        let interval = clamp_interval(interval);
        let max_backoff = self.settings.max_backoff;
        self.loop_slot
            .get_or_start(|| async {
                let ctx = Arc::clone(&self.ctx);
                Ok(LoopHandle::spawn(EnforcementModel::PollAndKill, move |token, health| {
                    ctx.run(interval, max_backoff, token, health)
                }))
            })
            .await
    }

    pub async fn stop_loop(&self, handle: &LoopHandle) -> Result<()> {
        self.loop_slot.stop(handle, self.settings.stop_timeout).await
    }

    pub fn live_loop(&self) -> Option<LoopHandle> {
        self.loop_slot.live()
    }

    pub fn directives(&self) -> Arc<DirectiveSet> {
        self.ctx.board.snapshot()
    }

    /// Run one enforcement pass immediately, outside the loop.
    pub async fn enforce_now(&self) -> Result<()> {
        let snapshot = self.ctx.board.snapshot();
        self.ctx.tick(&snapshot).await.map(|_| ())
    }

    fn publish(&self, set: DirectiveSet) {
        let now = self.ctx.clock.now();
        self.ctx.ledger.retain(|app| set.is_blocked(app, now));
        self.ctx.board.publish(set);
    }
}

impl PollContext {
    async fn run(
        self: Arc<Self>,
        interval: Duration,
        max_backoff: Duration,
        token: CancellationToken,
        health: Arc<LoopHealth>,
    ) {
        let mut backoff = Backoff::new(interval, max_backoff);
        info!(interval_ms = interval.as_millis() as u64, "poll-and-kill loop running");

        loop {
            if token.is_cancelled() {
                break;
            }

            let snapshot = self.board.snapshot();
            health.record_tick(self.clock.now());

            let delay = match self.tick(&snapshot).await {
                Ok(terminated) => {
                    if terminated > 0 {
                        health.record_terminations(terminated);
                    }
                    health.record_success();
                    backoff.reset();
                    interval
                }
                Err(err) => {
                    let delay = backoff.next_delay();
                    warn!(
                        error = %err,
                        retry_in_ms = delay.as_millis() as u64,
                        "process listing failed; backing off"
                    );
                    health.record_failure(&err);
                    delay
                }
            };

            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        debug!("poll-and-kill loop exited");
    }

    /// One pass over the process table. Returns how many processes were
    /// terminated; fails only when the process list cannot be read.
    async fn tick(&self, snapshot: &DirectiveSet) -> Result<u64> {
        let now = self.clock.now();
        self.ledger.retain(|app| snapshot.is_blocked(app, now));

        let active = snapshot.active_at(now);
        if active.is_empty() {
            return Ok(0);
        }

        let processes = match self.control.running_processes().await {
            Ok(processes) => processes,
            Err(err) => {
                // Without a listing nothing is known to be enforced.
                let reason = format!("process listing unavailable: {err}");
                for directive in active {
                    self.ledger.record(
                        directive.app,
                        EnforcementState::EnforcementFailed(reason.clone()),
                    );
                }
                return Err(TimeguardError::TransientPlatform(err.to_string()));
            }
        };

        let mut terminated = 0;
        for directive in active {
            let mut failure = None;
            for process in processes.iter().filter(|p| directive.app.matches_process(&p.app)) {
                match self.control.terminate(process).await {
                    Ok(()) => {
                        terminated += 1;
                        info!(app_id = %directive.app, pid = process.pid, "terminated blocked process");
                    }
                    Err(err) => {
                        warn!(app_id = %directive.app, pid = process.pid, error = %err, "failed to terminate blocked process");
                        failure = Some(err.to_string());
                    }
                }
            }

            let state = match failure {
                Some(reason) => EnforcementState::EnforcementFailed(reason),
                None => EnforcementState::Enforced,
            };
            self.ledger.record(directive.app, state);
        }

        Ok(terminated)
    }
}

fn clamp_interval(interval: Duration) -> Duration {
    interval.clamp(
        Duration::from_millis(MIN_POLL_INTERVAL_MS),
        Duration::from_millis(MAX_POLL_INTERVAL_MS),
    )
}
