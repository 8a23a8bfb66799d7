use std::time::Duration;

use chrono::{DurationRound, Timelike};
use task_scheduler_core::models::{TriggerExpression, TriggerFired, TriggerPlan};
use task_scheduler_dispatcher::{secondary_key, TriggerRegistry};
use tokio::sync::mpsc::UnboundedReceiver;

async fn next_fire(rx: &mut UnboundedReceiver<TriggerFired>, within: Duration) -> Option<TriggerFired> {
    tokio::time::timeout(within, rx.recv()).await.ok().flatten()
}

#[tokio::test(start_paused = true)]
async fn test_one_shot_fires_once_at_its_moment() {
    let (registry, mut fires) = TriggerRegistry::new();
    let at = registry.now() + chrono::Duration::seconds(90);

    let generation = registry
        .arm("report", &TriggerPlan::single(TriggerExpression::At(at)))
        .unwrap();
    assert!(registry.is_armed("report"));

    assert!(next_fire(&mut fires, Duration::from_secs(60)).await.is_none());
    let fired = next_fire(&mut fires, Duration::from_secs(60)).await.unwrap();
    assert_eq!(fired.code, "report");
    assert_eq!(fired.generation, generation);
    assert_eq!(fired.scheduled_for, at);

    tokio::task::yield_now().await;
    assert!(!registry.is_armed("report"));
    assert!(registry.is_current("report", generation));
    assert!(next_fire(&mut fires, Duration::from_secs(3_600)).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_past_moment_fires_immediately() {
    let (registry, mut fires) = TriggerRegistry::new();
    let at = registry.now() - chrono::Duration::hours(2);

    registry
        .arm("catch-up", &TriggerPlan::single(TriggerExpression::At(at)))
        .unwrap();

    let fired = next_fire(&mut fires, Duration::from_millis(10)).await.unwrap();
    assert_eq!(fired.scheduled_for, at);
}

#[tokio::test(start_paused = true)]
async fn test_cron_trigger_repeats_on_minute_boundaries() {
    let (registry, mut fires) = TriggerRegistry::new();
    registry
        .arm("tick", &TriggerPlan::single(TriggerExpression::cron("*/1 * * * *")))
        .unwrap();

    let mut moments = Vec::new();
    for _ in 0..3 {
        let fired = next_fire(&mut fires, Duration::from_secs(61)).await.unwrap();
        assert_eq!(fired.scheduled_for.second(), 0);
        moments.push(fired.scheduled_for);
    }
    assert_eq!(moments[1] - moments[0], chrono::Duration::minutes(1));
    assert_eq!(moments[2] - moments[1], chrono::Duration::minutes(1));
    assert!(registry.is_armed("tick"));
}

#[tokio::test(start_paused = true)]
async fn test_two_stage_plan_promotes_to_interval_trigger() {
    let (registry, mut fires) = TriggerRegistry::new();
    let start = (registry.now() + chrono::Duration::minutes(2))
        .duration_trunc(chrono::Duration::minutes(1))
        .unwrap();

    let generation = registry
        .arm(
            "sync",
            &TriggerPlan::two_stage(start, TriggerExpression::cron("*/1 * * * *")),
        )
        .unwrap();
    assert_eq!(
        registry.armed_expression("sync"),
        Some(TriggerExpression::At(start))
    );

    let until_start = (start - registry.now()).to_std().unwrap();
    assert!(next_fire(&mut fires, until_start).await.is_none());

    let fired = next_fire(&mut fires, Duration::from_secs(61)).await.unwrap();
    assert_eq!(fired.code, "sync");
    assert_eq!(fired.generation, generation);
    assert_eq!(fired.scheduled_for, start + chrono::Duration::minutes(1));

    assert_eq!(registry.armed_codes(), vec![secondary_key("sync")]);
    assert!(registry.is_armed("sync"));

    assert!(registry.cancel("sync"));
    assert!(registry.armed_codes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_rearming_replaces_the_previous_trigger() {
    let (registry, mut fires) = TriggerRegistry::new();
    let plan = TriggerPlan::single(TriggerExpression::cron("*/1 * * * *"));

    let first = registry.arm("dup", &plan).unwrap();
    let second = registry.arm("dup", &plan).unwrap();
    assert_ne!(first, second);
    assert!(!registry.is_current("dup", first));
    assert_eq!(registry.generation("dup"), Some(second));
    assert_eq!(registry.armed_codes(), vec!["dup".to_string()]);

    let fired = next_fire(&mut fires, Duration::from_secs(61)).await.unwrap();
    assert_eq!(fired.generation, second);
    assert!(next_fire(&mut fires, Duration::from_secs(30)).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_is_idempotent_and_stops_fires() {
    let (registry, mut fires) = TriggerRegistry::new();
    let generation = registry
        .arm("stop-me", &TriggerPlan::single(TriggerExpression::cron("*/1 * * * *")))
        .unwrap();

    assert!(registry.cancel("stop-me"));
    assert!(!registry.cancel("stop-me"));
    assert!(!registry.cancel("never-armed"));
    assert!(!registry.is_current("stop-me", generation));
    assert!(next_fire(&mut fires, Duration::from_secs(180)).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_all() {
    let (registry, _fires) = TriggerRegistry::new();
    let plan = TriggerPlan::single(TriggerExpression::cron("0 3 * * *"));
    registry.arm("a", &plan).unwrap();
    registry.arm("b", &plan).unwrap();

    assert_eq!(registry.cancel_all(), 2);
    assert!(registry.armed_codes().is_empty());
    assert_eq!(registry.generation("a"), None);
}

#[tokio::test]
async fn test_invalid_expression_is_not_armed() {
    let (registry, _fires) = TriggerRegistry::new();
    let plan = TriggerPlan::single(TriggerExpression::cron("every minute"));

    assert!(TriggerRegistry::validate(&plan).is_err());
    assert!(registry.arm("bad", &plan).is_err());
    assert!(!registry.is_armed("bad"));
}
