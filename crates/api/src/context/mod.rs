//! Application context - dependency injection container

use std::sync::Arc;

use timeguard_core::{
    Clock, LoopSettings, PermissionGate, SyncCoordinator, SyncSettings, SystemClock,
    UsageCollector, UsageZone,
};
use timeguard_domain::{Config, Result};
use timeguard_infra::scheduling::{SchedulerError, SchedulerResult};
use timeguard_infra::{
    build_platform, DbManager, ResyncScheduler, ResyncSchedulerConfig, SqliteAppRepository,
    SqliteBlockPolicyRepository, SqliteUsageRepository, UsageSampler, UsageSamplerConfig,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::utils::health::{ComponentHealth, HealthStatus};

/// Everything the daemon and the boundary commands share.
pub struct AppContext {
    pub config: Config,
    pub db: Arc<DbManager>,
    pub coordinator: Arc<SyncCoordinator>,
    /// Direct access to the directive table for the settings layer.
    pub policy: Arc<SqliteBlockPolicyRepository>,
    /// Present when the profile's usage source is fed by sampling.
    pub usage_sampler: Option<Mutex<UsageSampler>>,
    pub resync_scheduler: Mutex<ResyncScheduler>,
}

impl AppContext {
    /// Create a context from the loaded configuration (env vars, then config
    /// files, then defaults).
    pub async fn new() -> Result<Self> {
        let config = timeguard_infra::config::load()?;
        Self::new_with_config(config).await
    }

    /// Create a context with an explicit configuration
    ///
    /// Tests use this to point at a temporary database and pick a profile.
    pub async fn new_with_config(config: Config) -> Result<Self> {
        Self::new_with_clock(config, Arc::new(SystemClock)).await
    }

    /// Create a context whose engine reads time from `clock`.
    pub async fn new_with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let db = DbManager::open(&config.database.path, config.database.pool_size)?;

        let app_repo = Arc::new(SqliteAppRepository::new(Arc::clone(&db)));
        let usage_repo = Arc::new(SqliteUsageRepository::new(Arc::clone(&db)));
        let policy = Arc::new(SqliteBlockPolicyRepository::new(Arc::clone(&db)));

        let profile = config.platform.profile;
        let retention_days = config.sync.lookback_days.max(config.sync.discovery_window_days);
        let adapters = build_platform(
            profile,
            Arc::clone(&clock),
            LoopSettings::from(&config.enforcement),
            chrono::Duration::days(i64::from(retention_days)),
        )?;

        let gate = Arc::new(PermissionGate::new(
            adapters.permissions,
            adapters.requirements,
            Arc::clone(&clock),
        ));
        let collector = Arc::new(UsageCollector::new(
            adapters.usage,
            Arc::clone(&gate),
            Arc::clone(&clock),
            UsageZone::Local,
            config.sync.discovery_window_days,
        ));

        let settings = SyncSettings {
            platform: profile.to_string(),
            lookback_days: config.sync.lookback_days,
            poll_interval: config.enforcement.poll_interval(),
        };
        let coordinator = Arc::new(SyncCoordinator::new(
            gate,
            collector,
            app_repo,
            usage_repo,
            policy.clone(),
            adapters.enforcer,
            clock,
            settings,
        ));

        let usage_sampler = adapters.sampler.map(|source| {
            Mutex::new(UsageSampler::new(
                source,
                UsageSamplerConfig {
                    interval: config.sync.usage_sample_interval(),
                    ..UsageSamplerConfig::default()
                },
            ))
        });
        let resync_scheduler = Mutex::new(ResyncScheduler::new(
            Arc::clone(&coordinator),
            ResyncSchedulerConfig {
                interval: config.sync.resync_interval(),
                ..ResyncSchedulerConfig::default()
            },
        ));

        info!(
            profile = %profile,
            db_path = %db.path().display(),
            sampled = usage_sampler.is_some(),
            "application context ready"
        );

        Ok(Self { config, db, coordinator, policy, usage_sampler, resync_scheduler })
    }

    /// Start usage sampling, the enforcement loop and periodic re-sync.
    ///
    /// Components that are already running are left alone.
    pub async fn start_background_services(&self) -> Result<()> {
        if let Some(sampler) = &self.usage_sampler {
            tolerate_running(sampler.lock().await.start().await, "usage_sampler")?;
        }
        self.coordinator.start_background_services().await?;
        tolerate_running(self.resync_scheduler.lock().await.start().await, "resync_scheduler")?;
        Ok(())
    }

    /// Take one usage sample ahead of the first sync so sampled profiles have
    /// sessions to report. Returns `false` when no sample was taken.
    ///
    /// A failed sample is only logged; the periodic sampler tries again.
    pub async fn prime_usage(&self) -> bool {
        let Some(sampler) = &self.usage_sampler else {
            return false;
        };
        match sampler.lock().await.sample_now().await {
            Ok(summary) => {
                info!(running = summary.running, "primed usage log");
                true
            }
            Err(err) => {
                warn!(error = %err, "priming usage sample failed");
                false
            }
        }
    }

    /// Stop everything `start_background_services` started, in reverse
    /// order. Stopping idle components is not an error.
    pub async fn stop_background_services(&self) -> Result<()> {
        tolerate_stopped(self.resync_scheduler.lock().await.stop().await, "resync_scheduler")?;
        self.coordinator.stop_background_services().await;
        if let Some(sampler) = &self.usage_sampler {
            tolerate_stopped(sampler.lock().await.stop().await, "usage_sampler")?;
        }
        Ok(())
    }

    /// Check health of the database, permissions and background tasks
    ///
    /// The report is healthy when at least 80% of components are.
    pub async fn health_check(&self) -> HealthStatus {
        let mut status = HealthStatus::new().add_component(self.check_database_health().await);

        status = status.add_component(if self.coordinator.has_required_permissions().await {
            ComponentHealth::healthy("permissions")
        } else {
            ComponentHealth::unhealthy("permissions", "tracking or blocking not granted")
        });

        status = status.add_component(if self.coordinator.is_loop_running().await {
            ComponentHealth::healthy("enforcement_loop")
        } else {
            ComponentHealth::unhealthy("enforcement_loop", "not running")
        });

        if let Some(sampler) = &self.usage_sampler {
            status = status.add_component(running_component(
                "usage_sampler",
                sampler.lock().await.is_running(),
            ));
        }
        status = status.add_component(running_component(
            "resync_scheduler",
            self.resync_scheduler.lock().await.is_running(),
        ));

        status.calculate_score();
        status
    }

    /// Runs on the blocking pool so a slow disk never stalls the runtime.
    async fn check_database_health(&self) -> ComponentHealth {
        let db = Arc::clone(&self.db);
        match tokio::task::spawn_blocking(move || db.health_check()).await {
            Ok(Ok(())) => ComponentHealth::healthy("database"),
            Ok(Err(e)) => {
                warn!(error = %e, "database health check failed");
                ComponentHealth::unhealthy("database", format!("query failed: {e}"))
            }
            Err(e) => {
                warn!(error = %e, "database health check task panicked");
                ComponentHealth::unhealthy("database", format!("task panic: {e}"))
            }
        }
    }

    /// Stop background services. Safe to call more than once.
    pub async fn shutdown(&self) -> Result<()> {
        info!("shutdown called on AppContext");
        self.stop_background_services().await
    }
}

fn running_component(name: &str, running: bool) -> ComponentHealth {
    if running {
        ComponentHealth::healthy(name)
    } else {
        ComponentHealth::unhealthy(name, "not running")
    }
}

fn tolerate_running(result: SchedulerResult<()>, component: &'static str) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(SchedulerError::AlreadyRunning) => {
            info!(component, "already running");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn tolerate_stopped(result: SchedulerResult<()>, component: &'static str) -> Result<()> {
    match result {
        Ok(()) | Err(SchedulerError::NotRunning) => {
            info!(component, "stopped");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}
