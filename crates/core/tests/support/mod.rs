//! Shared test helpers for `timeguard-core` integration tests.
//!
//! In-memory fakes for every port so scenarios can run without an OS or a
//! database.
#![allow(dead_code)]

pub mod platform;
pub mod repositories;

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use timeguard_core::{ManualClock, PermissionGate};
use timeguard_domain::{Capability, RequirementMap};

pub use platform::*;
pub use repositories::*;

/// 2026-03-10 12:00:00 UTC, the default "now" of every scenario.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
}

pub fn clock() -> ManualClock {
    ManualClock::new(base_time())
}

pub fn desktop_requirements() -> RequirementMap {
    RequirementMap {
        usage_tracking: vec![Capability::UsageStatistics],
        blocking: vec![Capability::ProcessControl],
    }
}

pub fn gate_with(provider: Arc<FakePermissionProvider>, clock: &ManualClock) -> Arc<PermissionGate> {
    Arc::new(PermissionGate::new(provider, desktop_requirements(), Arc::new(clock.clone())))
}

/// Yield to spawned tasks a few times on the current-thread runtime.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
