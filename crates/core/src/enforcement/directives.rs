//! Directive snapshots and per-app enforcement bookkeeping

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use timeguard_domain::{AppId, BlockDirective, EnforcementState};
use tokio::sync::watch;

/// Immutable snapshot of the declared block policy.
///
/// Duplicate directives for one app collapse to the longest-lived one. The
/// set never filters by time itself; callers ask for the active subset at a
/// given instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectiveSet {
    entries: BTreeMap<AppId, Option<DateTime<Utc>>>,
}

impl DirectiveSet {
    pub fn new(directives: impl IntoIterator<Item = BlockDirective>) -> Self {
        let mut entries: BTreeMap<AppId, Option<DateTime<Utc>>> = BTreeMap::new();
        for directive in directives {
            entries
                .entry(directive.app)
                .and_modify(|current| *current = longer(*current, directive.expires_at))
                .or_insert(directive.expires_at);
        }
        Self { entries }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn directives(&self) -> impl Iterator<Item = BlockDirective> + '_ {
        self.entries
            .iter()
            .map(|(app, expires_at)| BlockDirective { app: app.clone(), expires_at: *expires_at })
    }

    pub fn apps(&self) -> impl Iterator<Item = &AppId> {
        self.entries.keys()
    }

    /// Directives still in force at `now`.
    pub fn active_at(&self, now: DateTime<Utc>) -> Vec<BlockDirective> {
        self.directives().filter(|directive| directive.is_active_at(now)).collect()
    }

    pub fn is_blocked(&self, app: &AppId, now: DateTime<Utc>) -> bool {
        self.entries
            .get(app)
            .is_some_and(|expiry| expiry.map_or(true, |expiry| now < expiry))
    }

    /// Copy of this set without `app`.
    pub fn without(&self, app: &AppId) -> Self {
        let mut entries = self.entries.clone();
        entries.remove(app);
        Self { entries }
    }
}

fn longer(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        _ => None,
    }
}

/// Publishes directive snapshots to an enforcement loop.
///
/// A tick clones the current `Arc` once and works on that value, so a policy
/// change never lands halfway through a tick.
#[derive(Debug, Clone)]
pub struct DirectiveBoard {
    tx: Arc<watch::Sender<Arc<DirectiveSet>>>,
}

impl DirectiveBoard {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(DirectiveSet::empty()));
        Self { tx: Arc::new(tx) }
    }

    pub fn publish(&self, set: DirectiveSet) {
        self.tx.send_replace(Arc::new(set));
    }

    pub fn snapshot(&self) -> Arc<DirectiveSet> {
        Arc::clone(&self.tx.borrow())
    }
}

impl Default for DirectiveBoard {
    fn default() -> Self {
        Self::new()
    }
}

/// Last observed outcome per app, as recorded by the strategy.
///
/// [`EnforcementLedger::states`] derives the reported view fresh from the
/// directive snapshot and the current instant, so an expired directive reads
/// `Unenforced` even if no tick has run since it expired.
#[derive(Debug, Clone, Default)]
pub struct EnforcementLedger {
    observed: Arc<Mutex<HashMap<AppId, EnforcementState>>>,
}

impl EnforcementLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, app: AppId, state: EnforcementState) {
        self.observed.lock().insert(app, state);
    }

    /// Replace every observation at once.
    pub fn reset(&self, states: HashMap<AppId, EnforcementState>) {
        *self.observed.lock() = states;
    }

    /// Drop observations for apps `keep` rejects.
    pub fn retain(&self, mut keep: impl FnMut(&AppId) -> bool) {
        self.observed.lock().retain(|app, _| keep(app));
    }

    pub fn clear(&self) {
        self.observed.lock().clear();
    }

    pub fn observed(&self, app: &AppId) -> Option<EnforcementState> {
        self.observed.lock().get(app).cloned()
    }

    /// State of every app named by `set` at `now`.
    pub fn states(&self, set: &DirectiveSet, now: DateTime<Utc>) -> BTreeMap<AppId, EnforcementState> {
        let observed = self.observed.lock();
        set.apps()
            .map(|app| {
                let state = if set.is_blocked(app, now) {
                    observed.get(app).cloned().unwrap_or(EnforcementState::Unenforced)
                } else {
                    EnforcementState::Unenforced
                };
                (app.clone(), state)
            })
            .collect()
    }

    /// Active apps whose last observation is `Enforced`.
    pub fn enforced(&self, set: &DirectiveSet, now: DateTime<Utc>) -> Vec<AppId> {
        self.states(set, now)
            .into_iter()
            .filter_map(|(app, state)| state.is_enforced().then_some(app))
            .collect()
    }
}
