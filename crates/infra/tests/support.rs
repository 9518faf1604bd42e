#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use parking_lot::Mutex;
use tempfile::TempDir;
use timeguard_core::{ProcessControl, RunningProcess};
use timeguard_domain::{AppId, UsageRecord};
use timeguard_infra::database::{
    DbManager, SqliteAppRepository, SqliteBlockPolicyRepository, SqliteUsageRepository,
};

/// Temporary database that keeps its directory alive for the test run.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("timeguard-test.db");
        let manager = DbManager::open(&db_path, 4).expect("database should open and migrate");
        Self { manager, _temp_dir: temp_dir }
    }

    pub fn apps(&self) -> SqliteAppRepository {
        SqliteAppRepository::new(Arc::clone(&self.manager))
    }

    pub fn usage(&self) -> SqliteUsageRepository {
        SqliteUsageRepository::new(Arc::clone(&self.manager))
    }

    pub fn policy(&self) -> SqliteBlockPolicyRepository {
        SqliteBlockPolicyRepository::new(Arc::clone(&self.manager))
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, hour, minute, 0).single().expect("valid timestamp")
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, d).expect("valid date")
}

pub fn usage(app: &str, date: NaiveDate, secs: i64, launches: u32) -> UsageRecord {
    UsageRecord {
        app: AppId::new(app),
        date,
        foreground_secs: secs,
        launch_count: launches,
        last_used: None,
    }
}

/// Process table whose contents the test sets directly.
#[derive(Default)]
pub struct ScriptedProcessTable {
    processes: Mutex<Vec<RunningProcess>>,
    terminated: Mutex<Vec<u32>>,
}

impl ScriptedProcessTable {
    pub fn set(&self, processes: Vec<RunningProcess>) {
        *self.processes.lock() = processes;
    }

    pub fn terminated(&self) -> Vec<u32> {
        self.terminated.lock().clone()
    }
}

#[async_trait]
impl ProcessControl for ScriptedProcessTable {
    async fn running_processes(&self) -> timeguard_domain::Result<Vec<RunningProcess>> {
        Ok(self.processes.lock().clone())
    }

    async fn terminate(&self, process: &RunningProcess) -> timeguard_domain::Result<()> {
        self.terminated.lock().push(process.pid);
        self.processes.lock().retain(|p| p.pid != process.pid);
        Ok(())
    }
}
