//! Poll-and-kill loop behaviour on a paused tokio clock.

mod support;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use support::*;
use timeguard_core::{LoopSettings, PollAndKillEnforcer};
use timeguard_domain::{AppId, BlockDirective, EnforcementState, EnumerationScope};

fn enforcer(
    processes: &Arc<FakeProcessControl>,
    clock: &timeguard_core::ManualClock,
) -> PollAndKillEnforcer {
    PollAndKillEnforcer::new(
        processes.clone(),
        Arc::new(clock.clone()),
        EnumerationScope::Full,
        LoopSettings::default(),
    )
}

#[tokio::test(start_paused = true)]
async fn blocked_process_is_killed_within_one_interval_and_released_on_expiry() {
    let clock = clock();
    let processes = Arc::new(FakeProcessControl::default());
    processes.spawn_process(100, "Steam.exe");
    processes.spawn_process(200, "notepad.exe");

    let enforcer = enforcer(&processes, &clock);
    enforcer
        .apply(vec![BlockDirective::until(AppId::new("steam"), base_time() + Duration::seconds(60))])
        .await
        .unwrap();
    let handle = enforcer.start_loop(StdDuration::from_secs(2)).await.unwrap();

    tokio::time::sleep(StdDuration::from_secs(2)).await;

    assert!(!processes.is_running("steam"));
    assert!(processes.is_running("notepad"));
    assert_eq!(enforcer.currently_enforced(), vec![AppId::new("steam")]);
    assert!(handle.health().terminations() >= 1);

    // The directive lapses; the app may run again and is reported unenforced
    // without waiting for another tick.
    clock.advance_secs(61);
    assert!(enforcer.currently_enforced().is_empty());
    assert_eq!(enforcer.enforcement_states()[&AppId::new("steam")], EnforcementState::Unenforced);

    processes.spawn_process(101, "steam.exe");
    tokio::time::sleep(StdDuration::from_secs(4)).await;
    assert!(processes.is_running("steam"));

    enforcer.stop_loop(&handle).await.unwrap();
    assert!(!handle.is_alive());
    assert!(enforcer.live_loop().is_none());
}

#[tokio::test(start_paused = true)]
async fn unkillable_process_is_reported_and_the_loop_keeps_going() {
    let clock = clock();
    let processes = Arc::new(FakeProcessControl::default());
    processes.spawn_process(10, "guard.exe");
    processes.spawn_process(11, "game.exe");
    processes.make_unkillable("guard");

    let enforcer = enforcer(&processes, &clock);
    enforcer
        .apply(vec![
            BlockDirective::indefinite(AppId::new("guard")),
            BlockDirective::indefinite(AppId::new("game")),
        ])
        .await
        .unwrap();
    let handle = enforcer.start_loop(StdDuration::from_secs(2)).await.unwrap();

    tokio::time::sleep(StdDuration::from_secs(5)).await;

    let states = enforcer.enforcement_states();
    assert!(matches!(states[&AppId::new("guard")], EnforcementState::EnforcementFailed(_)));
    assert_eq!(states[&AppId::new("game")], EnforcementState::Enforced);
    assert_eq!(enforcer.currently_enforced(), vec![AppId::new("game")]);
    assert!(handle.is_alive());
    assert!(handle.health().ticks() >= 3);
    assert_eq!(handle.health().failures(), 0);

    enforcer.stop_loop(&handle).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn listing_failures_back_off_then_recover() {
    let clock = clock();
    let processes = Arc::new(FakeProcessControl::default());
    processes.fail_listing(true);

    let enforcer = enforcer(&processes, &clock);
    enforcer.apply(vec![BlockDirective::indefinite(AppId::new("game"))]).await.unwrap();
    let handle = enforcer.start_loop(StdDuration::from_secs(2)).await.unwrap();

    // Failed attempts at 0s, 2s, 6s and 14s instead of every 2s.
    tokio::time::sleep(StdDuration::from_secs(15)).await;
    assert_eq!(processes.listing_count(), 4);
    assert_eq!(handle.health().consecutive_failures(), 4);
    assert!(handle.health().last_error().is_some());
    assert!(handle.is_alive());

    processes.fail_listing(false);
    processes.spawn_process(7, "game.exe");
    tokio::time::sleep(StdDuration::from_secs(16)).await;

    assert!(!processes.is_running("game"));
    assert_eq!(handle.health().consecutive_failures(), 0);

    enforcer.stop_loop(&handle).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn no_listing_happens_without_active_directives() {
    let clock = clock();
    let processes = Arc::new(FakeProcessControl::default());
    let enforcer = enforcer(&processes, &clock);
    let handle = enforcer.start_loop(StdDuration::from_secs(2)).await.unwrap();

    tokio::time::sleep(StdDuration::from_secs(10)).await;

    assert_eq!(processes.listing_count(), 0);
    assert!(handle.health().ticks() >= 5);
    enforcer.stop_loop(&handle).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn start_loop_returns_the_running_loop() {
    let clock = clock();
    let processes = Arc::new(FakeProcessControl::default());
    let enforcer = enforcer(&processes, &clock);

    let (a, b) = tokio::join!(
        enforcer.start_loop(StdDuration::from_secs(2)),
        enforcer.start_loop(StdDuration::from_secs(2)),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.id(), b.id());

    let again = enforcer.start_loop(StdDuration::from_secs(5)).await.unwrap();
    assert_eq!(again.id(), a.id());

    enforcer.stop_loop(&a).await.unwrap();
    let restarted = enforcer.start_loop(StdDuration::from_secs(2)).await.unwrap();
    assert_ne!(restarted.id(), a.id());
    enforcer.stop_loop(&restarted).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn removed_directive_stops_enforcement_on_next_tick() {
    let clock = clock();
    let processes = Arc::new(FakeProcessControl::default());
    let enforcer = enforcer(&processes, &clock);
    enforcer
        .apply(vec![
            BlockDirective::indefinite(AppId::new("game")),
            BlockDirective::indefinite(AppId::new("chat")),
        ])
        .await
        .unwrap();
    let handle = enforcer.start_loop(StdDuration::from_secs(2)).await.unwrap();
    tokio::time::sleep(StdDuration::from_secs(1)).await;

    enforcer.remove(&AppId::new("game")).await.unwrap();
    processes.spawn_process(1, "game");
    processes.spawn_process(2, "chat");
    tokio::time::sleep(StdDuration::from_secs(2)).await;

    assert!(processes.is_running("game"));
    assert!(!processes.is_running("chat"));
    assert_eq!(enforcer.directives().len(), 1);
    enforcer.stop_loop(&handle).await.unwrap();
}

#[tokio::test]
async fn enforce_now_runs_a_single_pass() {
    let clock = clock();
    let processes = Arc::new(FakeProcessControl::default());
    processes.spawn_process(1, "game.exe");
    processes.spawn_process(2, "game.exe");
    let enforcer = enforcer(&processes, &clock);
    enforcer.apply(vec![BlockDirective::indefinite(AppId::new("game"))]).await.unwrap();

    enforcer.enforce_now().await.unwrap();

    assert_eq!(processes.kill_count(), 2);
    assert!(enforcer.live_loop().is_none());
}

#[tokio::test]
async fn failed_listing_marks_active_apps_failed() {
    let clock = clock();
    let processes = Arc::new(FakeProcessControl::default());
    processes.spawn_process(1, "game.exe");
    let enforcer = enforcer(&processes, &clock);
    enforcer.apply(vec![BlockDirective::indefinite(AppId::new("game"))]).await.unwrap();

    enforcer.enforce_now().await.unwrap();
    assert_eq!(enforcer.currently_enforced(), vec![AppId::new("game")]);

    processes.fail_listing(true);
    assert!(enforcer.enforce_now().await.is_err());

    match &enforcer.enforcement_states()[&AppId::new("game")] {
        EnforcementState::EnforcementFailed(reason) => {
            assert!(reason.starts_with("process listing unavailable"));
        }
        other => panic!("expected a failed state, got {other:?}"),
    }
    assert!(enforcer.currently_enforced().is_empty());
}

#[tokio::test]
async fn executable_style_directive_matches_running_process() {
    let clock = clock();
    let processes = Arc::new(FakeProcessControl::default());
    processes.spawn_process(1, "Steam.exe");
    processes.spawn_process(2, "steamwebhelper.exe");
    let enforcer = enforcer(&processes, &clock);
    enforcer.apply(vec![BlockDirective::indefinite(AppId::new("Steam.exe"))]).await.unwrap();

    enforcer.enforce_now().await.unwrap();

    assert!(!processes.is_running("steam"));
    assert!(processes.is_running("steamwebhelper"));
    assert_eq!(enforcer.currently_enforced(), vec![AppId::new("steam.exe")]);
}
