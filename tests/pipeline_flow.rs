mod common;

use std::collections::HashSet;
use std::time::Duration;

use common::{CountingCoach, CountingStore, FOCUS, batch, quick_config, rig};
use preflop_coach::cache::CacheConfig;
use preflop_coach::cards::Hand;
use preflop_coach::game::Decision;
use preflop_coach::pipeline::{PipelineConfig, PipelineError, fallback_action};
use preflop_coach::progress::SkillLevel;
use preflop_coach::scenario::Scenario;
use preflop_coach::position::Position;
use preflop_coach::store::{MemoryScenarioStore, ScenarioSource};

const LEVEL: SkillLevel = SkillLevel::Beginner;

#[tokio::test]
async fn warm_cache_serves_without_touching_collaborators() -> anyhow::Result<()> {
    let rig = rig(
        CountingStore::new(MemoryScenarioStore::new()),
        CountingCoach::mock(1),
        quick_config(),
    );
    rig.pipeline.cache().merge(LEVEL, FOCUS, batch("warm", 15)).await?;

    let served = rig.pipeline.next_scenario(LEVEL, FOCUS).await?;
    rig.pipeline.background().flush().await;

    assert_eq!(served.source, ScenarioSource::Cache);
    assert!(served.has_id());
    assert_eq!(rig.store.gets(), 0);
    assert_eq!(rig.coach.scenarios(), 0);
    assert_eq!(rig.pipeline.cache().lookup(LEVEL, FOCUS).await.scenarios.len(), 14);
    Ok(())
}

#[tokio::test]
async fn cold_cache_seeds_from_the_database() -> anyhow::Result<()> {
    let rig = rig(
        CountingStore::new(MemoryScenarioStore::with_scenarios(batch("db", 5))),
        CountingCoach::mock(2),
        quick_config(),
    );

    let served = rig.pipeline.next_scenario(LEVEL, FOCUS).await?;
    assert_eq!(served.source, ScenarioSource::Database);
    assert_eq!(rig.store.gets(), 1);
    assert_eq!(rig.coach.scenarios(), 0);

    let pool = rig.pipeline.cache().lookup(LEVEL, FOCUS).await;
    assert_eq!(pool.scenarios.len(), 4);
    assert!(pool.needs_refresh);
    assert!(pool.scenarios.iter().all(|s| s.id != served.scenario.id));
    Ok(())
}

#[tokio::test]
async fn empty_database_falls_through_to_the_coach() -> anyhow::Result<()> {
    let rig = rig(
        CountingStore::new(MemoryScenarioStore::new()),
        CountingCoach::mock(3),
        quick_config(),
    );

    let served = rig.pipeline.next_scenario(LEVEL, FOCUS).await?;
    rig.pipeline.background().flush().await;

    assert_eq!(served.source, ScenarioSource::AiGenerated);
    let id = served.scenario.id.clone().unwrap_or_default();
    assert!(id.starts_with("ai_"), "{id}");
    assert_eq!(served.scenario.used_count, 0);
    assert_eq!(served.scenario.success_rate, 0.0);
    served.scenario.scenario.check_invariants()?;

    assert_eq!(rig.coach.scenarios(), 3);
    assert_eq!(rig.store.inner.scenario_count(), 3);
    assert_eq!(rig.pipeline.cache().lookup(LEVEL, FOCUS).await.scenarios.len(), 2);
    Ok(())
}

#[tokio::test]
async fn every_tier_failing_yields_a_local_fallback() -> anyhow::Result<()> {
    let rig = rig(CountingStore::failing(), CountingCoach::offline(), quick_config());

    let served = rig.pipeline.next_scenario(LEVEL, FOCUS).await?;
    assert_eq!(served.source, ScenarioSource::Fallback);
    assert!(!served.has_id());
    assert!(served.scenario.id.is_none());
    assert_eq!(
        served.scenario.correct_action,
        fallback_action(&served.scenario.hand, &served.scenario.scenario)
    );
    assert_eq!(rig.coach.scenarios(), 3);
    Ok(())
}

#[tokio::test]
async fn hung_store_is_cut_off_by_the_timeout() -> anyhow::Result<()> {
    let rig = rig(CountingStore::hanging(), CountingCoach::offline(), quick_config());

    let served = tokio::time::timeout(
        Duration::from_secs(2),
        rig.pipeline.next_scenario(LEVEL, FOCUS),
    )
    .await??;
    assert_eq!(served.source, ScenarioSource::Fallback);
    Ok(())
}

#[tokio::test]
async fn disabled_fallback_surfaces_exhaustion() {
    let config = PipelineConfig {
        allow_local_fallback: false,
        ..quick_config()
    };
    let rig = rig(CountingStore::failing(), CountingCoach::offline(), config);

    let result = rig.pipeline.next_scenario(LEVEL, FOCUS).await;
    assert!(matches!(result, Err(PipelineError::Exhausted { level: SkillLevel::Beginner, .. })));
}

#[tokio::test]
async fn expired_pool_counts_as_a_miss() -> anyhow::Result<()> {
    let config = PipelineConfig {
        cache: CacheConfig {
            expiry: Duration::from_millis(1),
            ..CacheConfig::default()
        },
        ..quick_config()
    };
    let rig = rig(
        CountingStore::new(MemoryScenarioStore::with_scenarios(batch("db", 3))),
        CountingCoach::offline(),
        config,
    );
    rig.pipeline.cache().merge(LEVEL, FOCUS, batch("stale", 15)).await?;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let served = rig.pipeline.next_scenario(LEVEL, FOCUS).await?;
    assert_eq!(served.source, ScenarioSource::Database);
    Ok(())
}

#[tokio::test]
async fn low_pool_triggers_a_background_refill() -> anyhow::Result<()> {
    let rig = rig(
        CountingStore::new(MemoryScenarioStore::with_scenarios(batch("db", 10))),
        CountingCoach::offline(),
        quick_config(),
    );
    rig.pipeline.cache().merge(LEVEL, FOCUS, batch("warm", 10)).await?;

    let served = rig.pipeline.next_scenario(LEVEL, FOCUS).await?;
    assert_eq!(served.source, ScenarioSource::Cache);
    rig.pipeline.background().flush().await;

    assert_eq!(rig.store.gets(), 1);
    let pool = rig.pipeline.cache().lookup(LEVEL, FOCUS).await;
    assert_eq!(pool.scenarios.len(), 19);
    let ids: HashSet<_> = pool.scenarios.iter().map(|s| s.id.clone()).collect();
    assert_eq!(ids.len(), 19);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_never_share_a_cached_scenario() -> anyhow::Result<()> {
    let rig = rig(
        CountingStore::new(MemoryScenarioStore::new()),
        CountingCoach::offline(),
        quick_config(),
    );
    rig.pipeline.cache().merge(LEVEL, FOCUS, batch("pool", 20)).await?;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let pipeline = rig.pipeline.clone();
        handles.push(tokio::spawn(async move { pipeline.next_scenario(LEVEL, FOCUS).await }));
    }
    let mut ids = HashSet::new();
    for handle in handles {
        let served = handle.await??;
        assert_eq!(served.source, ScenarioSource::Cache);
        assert!(ids.insert(served.scenario.id.clone()));
    }
    rig.pipeline.background().flush().await;
    assert_eq!(rig.pipeline.cache().lookup(LEVEL, FOCUS).await.scenarios.len(), 10);
    Ok(())
}

#[tokio::test]
async fn concurrent_cold_requests_get_distinct_scenarios() -> anyhow::Result<()> {
    let rig = rig(
        CountingStore::slow_gets(
            MemoryScenarioStore::with_scenarios(batch("db", 5)),
            Duration::from_millis(20),
        ),
        CountingCoach::offline(),
        quick_config(),
    );

    let (first, second) = tokio::join!(
        rig.pipeline.next_scenario(LEVEL, FOCUS),
        rig.pipeline.next_scenario(LEVEL, FOCUS)
    );
    let (first, second) = (first?, second?);

    assert_ne!(first.scenario.id, second.scenario.id);
    assert_eq!(first.source, ScenarioSource::Database);
    assert_eq!(second.source, ScenarioSource::Cache);
    let pool = rig.pipeline.cache().lookup(LEVEL, FOCUS).await;
    assert_eq!(pool.scenarios.len(), 3);
    assert!(
        pool.scenarios
            .iter()
            .all(|s| s.id != first.scenario.id && s.id != second.scenario.id)
    );
    Ok(())
}

fn spot(is_raised: bool) -> Scenario {
    Scenario {
        position: Position::Mp,
        pot: if is_raised { 3.5 } else { 1.5 },
        to_call: if is_raised { 2.0 } else { 1.0 },
        is_raised,
        num_callers: 0,
        players_in_hand: 6,
        actions_before: if is_raised {
            vec![preflop_coach::game::SeatAction::Raise]
        } else {
            Vec::new()
        },
        phase: Default::default(),
    }
}

#[test]
fn fallback_heuristic_follows_pair_and_ace_thresholds() {
    let hand = |s: &str| -> Hand { s.parse().expect("valid hand") };
    assert_eq!(fallback_action(&hand("Js Jd"), &spot(true)), Decision::Raise);
    assert_eq!(fallback_action(&hand("8s 8d"), &spot(false)), Decision::Call);
    assert_eq!(fallback_action(&hand("5s 5d"), &spot(false)), Decision::Fold);
    assert_eq!(fallback_action(&hand("As Td"), &spot(false)), Decision::Raise);
    assert_eq!(fallback_action(&hand("As Td"), &spot(true)), Decision::Call);
    assert_eq!(fallback_action(&hand("As 4d"), &spot(true)), Decision::Fold);
    assert_eq!(fallback_action(&hand("As 4d"), &spot(false)), Decision::Call);
    assert_eq!(fallback_action(&hand("Kd 7c"), &spot(false)), Decision::Call);
    assert_eq!(fallback_action(&hand("Kd 7c"), &spot(true)), Decision::Fold);
}
