//! SQLite repository coverage against the real schema.

mod support;

use chrono::Duration;
use support::{at, day, usage, TestDatabase};
use timeguard_core::{AppRepository, BlockPolicyRepository, UsageRepository};
use timeguard_domain::{
    AppCategory, AppId, AppIdentity, AppMetadata, BlockDirective, DiscoverySource,
};

fn metadata(source: DiscoverySource, hour: u32) -> AppMetadata {
    AppMetadata { platform: "desktop".into(), source, discovered_at: at(hour, 0) }
}

#[tokio::test(flavor = "multi_thread")]
async fn app_upsert_is_idempotent_and_keeps_first_discovery() {
    let db = TestDatabase::new();
    let repo = db.apps();
    let chat = AppIdentity::new(AppId::new("Com.Chat"), "Chat", AppCategory::Communication);

    repo.upsert_app(&chat, &metadata(DiscoverySource::UsageEvents, 9)).await.unwrap();
    repo.upsert_app(&chat, &metadata(DiscoverySource::UsageEvents, 9)).await.unwrap();

    let renamed = AppIdentity::new(AppId::new("com.chat"), "Chat Pro", AppCategory::Communication);
    repo.upsert_app(&renamed, &metadata(DiscoverySource::Enumerated, 11)).await.unwrap();

    assert_eq!(repo.count().await.unwrap(), 1);
    let stored = repo.list_apps().await.unwrap().remove(0);
    assert_eq!(stored.identity.id.as_str(), "com.chat");
    assert_eq!(stored.identity.display_name, "Chat Pro");
    assert_eq!(stored.metadata.source, DiscoverySource::Enumerated);
    assert_eq!(stored.metadata.discovered_at, at(9, 0));
}

#[tokio::test(flavor = "multi_thread")]
async fn usage_upsert_never_lowers_stored_values() {
    let db = TestDatabase::new();
    let repo = db.usage();
    let app = AppId::new("com.video");

    let mut first = usage("com.video", day(10), 1_200, 3);
    first.last_used = Some(at(14, 0));
    repo.upsert_usage(&first).await.unwrap();
    repo.upsert_usage(&first).await.unwrap();

    let mut smaller = usage("com.video", day(10), 300, 1);
    smaller.last_used = None;
    repo.upsert_usage(&smaller).await.unwrap();

    let stored = repo.get_usage(&app, day(10)).await.unwrap().expect("record stored");
    assert_eq!(stored, first);

    let mut larger = usage("com.video", day(10), 1_800, 4);
    larger.last_used = Some(at(15, 30));
    repo.upsert_usage(&larger).await.unwrap();

    let stored = repo.get_usage(&app, day(10)).await.unwrap().expect("record stored");
    assert_eq!(stored.foreground_secs, 1_800);
    assert_eq!(stored.launch_count, 4);
    assert_eq!(stored.last_used, Some(at(15, 30)));
}

#[tokio::test(flavor = "multi_thread")]
async fn usage_is_keyed_per_app_per_day() {
    let db = TestDatabase::new();
    let repo = db.usage();

    for record in [
        usage("a", day(9), 60, 1),
        usage("a", day(10), 120, 1),
        usage("b", day(10), 180, 2),
        usage("b", day(12), 240, 1),
    ] {
        repo.upsert_usage(&record).await.unwrap();
    }

    let window = repo.usage_between(day(9), day(10)).await.unwrap();
    let keys: Vec<(String, u32)> = window
        .iter()
        .map(|r| (r.app.to_string(), chrono::Datelike::day(&r.date)))
        .collect();
    assert_eq!(keys, vec![("a".into(), 9), ("a".into(), 10), ("b".into(), 10)]);
    assert!(repo.get_usage(&AppId::new("a"), day(11)).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn directives_round_trip_through_the_policy_table() {
    let db = TestDatabase::new();
    let repo = db.policy();

    repo.set_directive(&BlockDirective::indefinite(AppId::new("com.game"))).await.unwrap();
    repo.set_directive(&BlockDirective::until(AppId::new("com.chat"), at(13, 0))).await.unwrap();
    repo.set_directive(&BlockDirective::until(AppId::new("com.chat"), at(18, 0))).await.unwrap();

    let directives = repo.get_blocked_apps().await.unwrap();
    assert_eq!(
        directives,
        vec![
            BlockDirective::until(AppId::new("com.chat"), at(18, 0)),
            BlockDirective::indefinite(AppId::new("com.game")),
        ]
    );

    assert!(repo.clear_directive(&AppId::new("com.game")).await.unwrap());
    assert!(!repo.clear_directive(&AppId::new("com.game")).await.unwrap());
    assert_eq!(repo.get_blocked_apps().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn purge_only_removes_expired_directives() {
    let db = TestDatabase::new();
    let repo = db.policy();
    let now = at(12, 0);

    repo.set_directive(&BlockDirective::until(AppId::new("old"), now - Duration::minutes(1)))
        .await
        .unwrap();
    repo.set_directive(&BlockDirective::until(AppId::new("edge"), now)).await.unwrap();
    repo.set_directive(&BlockDirective::until(AppId::new("later"), now + Duration::hours(1)))
        .await
        .unwrap();
    repo.set_directive(&BlockDirective::indefinite(AppId::new("forever"))).await.unwrap();

    assert_eq!(repo.purge_expired(now).await.unwrap(), 2);
    let remaining: Vec<String> =
        repo.get_blocked_apps().await.unwrap().into_iter().map(|d| d.app.to_string()).collect();
    assert_eq!(remaining, vec!["forever", "later"]);
}

#[test]
fn reopening_an_existing_database_keeps_its_rows() {
    let temp_dir = tempfile::TempDir::new().expect("temp dir");
    let path = temp_dir.path().join("reopen.db");

    {
        let manager = timeguard_infra::DbManager::open(&path, 1).expect("first open");
        let conn = manager.get_connection().expect("connection");
        conn.execute(
            "INSERT INTO block_directives (app_id, expires_at, created_at) VALUES ('x', NULL, 0)",
            [],
        )
        .expect("insert");
    }

    let manager = timeguard_infra::DbManager::open(&path, 1).expect("second open");
    manager.health_check().expect("healthy");
    let conn = manager.get_connection().expect("connection");
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM block_directives", [], |row| row.get(0))
        .expect("count");
    assert_eq!(count, 1);
}
