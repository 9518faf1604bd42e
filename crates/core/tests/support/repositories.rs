use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use timeguard_core::{AppRepository, BlockPolicyRepository, UsageRepository};
use timeguard_domain::{
    AppId, AppIdentity, AppMetadata, BlockDirective, Result, TimeguardError, UsageRecord,
};

/// In-memory app store counting every upsert call.
#[derive(Default)]
pub struct InMemoryAppRepository {
    apps: Mutex<HashMap<AppId, (AppIdentity, AppMetadata)>>,
    pub upserts: AtomicUsize,
}

impl InMemoryAppRepository {
    pub fn len(&self) -> usize {
        self.apps.lock().len()
    }

    pub fn get(&self, id: &str) -> Option<(AppIdentity, AppMetadata)> {
        self.apps.lock().get(id).cloned()
    }

    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AppRepository for InMemoryAppRepository {
    async fn upsert_app(&self, app: &AppIdentity, metadata: &AppMetadata) -> Result<()> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.apps.lock().insert(app.id.clone(), (app.clone(), metadata.clone()));
        Ok(())
    }
}

/// In-memory usage store applying the monotonic merge rule.
#[derive(Default)]
pub struct InMemoryUsageRepository {
    records: Mutex<BTreeMap<(AppId, NaiveDate), UsageRecord>>,
    pub upserts: AtomicUsize,
}

impl InMemoryUsageRepository {
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn get(&self, app: &str, date: NaiveDate) -> Option<UsageRecord> {
        self.records.lock().get(&(AppId::new(app), date)).cloned()
    }

    pub fn total_foreground_secs(&self) -> i64 {
        self.records.lock().values().map(|r| r.foreground_secs).sum()
    }

    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UsageRepository for InMemoryUsageRepository {
    async fn upsert_usage(&self, record: &UsageRecord) -> Result<()> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.records
            .lock()
            .entry(record.key())
            .and_modify(|stored| {
                stored.merge(record);
            })
            .or_insert_with(|| record.clone());
        Ok(())
    }
}

/// Policy store whose contents and failure mode tests can change.
#[derive(Default)]
pub struct StaticPolicyRepository {
    directives: Mutex<Vec<BlockDirective>>,
    failing: AtomicBool,
}

impl StaticPolicyRepository {
    pub fn with(directives: Vec<BlockDirective>) -> Self {
        Self { directives: Mutex::new(directives), failing: AtomicBool::new(false) }
    }

    pub fn set(&self, directives: Vec<BlockDirective>) {
        *self.directives.lock() = directives;
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlockPolicyRepository for StaticPolicyRepository {
    async fn get_blocked_apps(&self) -> Result<Vec<BlockDirective>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TimeguardError::Repository("policy store offline".into()));
        }
        Ok(self.directives.lock().clone())
    }
}
