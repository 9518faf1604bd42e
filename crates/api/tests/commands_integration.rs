//! Boundary commands against a real context

mod support;

use support::create_test_context;
use timeguard_domain::{AppId, BlockDirective, PlatformProfile};
use timeguard_lib::{
    get_app_health, get_platform_info, has_required_permissions, perform_full_sync,
    request_permissions, start_background_services, stop_background_services,
};

#[tokio::test(flavor = "multi_thread")]
async fn shield_profile_needs_no_grants() {
    let (ctx, _temp_dir) = create_test_context(PlatformProfile::Shield).await;

    assert!(has_required_permissions(&ctx).await);
    assert!(request_permissions(&ctx).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn desktop_profile_is_ready_without_prompting() {
    let (ctx, _temp_dir) = create_test_context(PlatformProfile::Desktop).await;

    assert!(has_required_permissions(&ctx).await);

    let info = get_platform_info(&ctx).await;
    assert_eq!(info.get("enforcement.model").map(String::as_str), Some("poll_and_kill"));
    assert_eq!(info.get("enforcement.requires_polling").map(String::as_str), Some("true"));
}

#[tokio::test(flavor = "multi_thread")]
async fn full_sync_succeeds_when_shield_api_is_missing() {
    let (ctx, _temp_dir) = create_test_context(PlatformProfile::Shield).await;
    ctx.policy
        .set_directive(&BlockDirective::indefinite(AppId::new("com.game")))
        .await
        .expect("directive should be stored");

    assert!(perform_full_sync(&ctx).await);

    let report = ctx.coordinator.last_report().expect("report should be recorded");
    assert_eq!(report.directives, 1);
    assert_eq!(report.active_directives, 1);
    assert!(!report.warnings.is_empty(), "shield failure should be listed");
    assert!(ctx.coordinator.enforcer().currently_enforced().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn platform_info_reports_sync_and_directives() {
    let (ctx, _temp_dir) = create_test_context(PlatformProfile::Shield).await;
    ctx.policy
        .set_directive(&BlockDirective::indefinite(AppId::new("com.video")))
        .await
        .expect("directive should be stored");
    assert!(perform_full_sync(&ctx).await);

    let info = get_platform_info(&ctx).await;

    assert_eq!(info.get("platform").map(String::as_str), Some("shield"));
    assert_eq!(info.get("config.profile").map(String::as_str), Some("shield"));
    assert_eq!(info.get("enforcement.model").map(String::as_str), Some("declarative_shield"));
    assert_eq!(info.get("directives.total").map(String::as_str), Some("1"));
    assert_eq!(info.get("directives.enforced").map(String::as_str), Some("0"));
    assert!(info.contains_key("sync.last_finished_at"));
    assert!(info.contains_key("database.path"));
}

#[tokio::test(flavor = "multi_thread")]
async fn service_commands_toggle_the_loop() {
    let (ctx, _temp_dir) = create_test_context(PlatformProfile::Shield).await;

    start_background_services(&ctx).await.expect("start should succeed");
    let info = get_platform_info(&ctx).await;
    assert_eq!(info.get("loop.state").map(String::as_str), Some("running"));
    assert!(get_app_health(&ctx).await.is_healthy);

    stop_background_services(&ctx).await.expect("stop should succeed");
    let info = get_platform_info(&ctx).await;
    assert_eq!(info.get("loop.state").map(String::as_str), Some("stopped"));
}

#[tokio::test(flavor = "multi_thread")]
async fn health_report_serializes() {
    let (ctx, _temp_dir) = create_test_context(PlatformProfile::Shield).await;

    let health = get_app_health(&ctx).await;
    let json = serde_json::to_value(&health).expect("health should serialize");

    assert!(json["components"].as_array().is_some_and(|c| c.len() >= 4));
}
