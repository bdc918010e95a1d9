mod common;

use common::{CountingCoach, CountingStore, FOCUS, Rig, batch, quick_config, rig, training_scenario};
use preflop_coach::game::Decision;
use preflop_coach::progress::SkillLevel;
use preflop_coach::session::{SessionConfig, SessionError, TrainingSession};
use preflop_coach::store::{MemoryScenarioStore, ScenarioSource, ScenarioStore};
use preflop_coach::trainer::plain_outcome;

const USER: &str = "player-1";

async fn start(rig: &Rig) -> TrainingSession {
    TrainingSession::start(USER, rig.pipeline.clone(), SessionConfig::default()).await
}

#[tokio::test]
async fn new_players_get_a_saved_default_profile() -> anyhow::Result<()> {
    let rig = rig(
        CountingStore::new(MemoryScenarioStore::new()),
        CountingCoach::offline(),
        quick_config(),
    );
    let session = start(&rig).await;

    assert!(!session.is_offline());
    assert_eq!(session.progress().total_games, 0);
    let stored = rig.store.inner.get_player_progress(USER).await?;
    assert_eq!(stored.map(|p| p.current_focus), Some(FOCUS.to_string()));
    Ok(())
}

#[tokio::test]
async fn deciding_without_a_round_is_rejected() {
    let rig = rig(
        CountingStore::new(MemoryScenarioStore::new()),
        CountingCoach::offline(),
        quick_config(),
    );
    let mut session = start(&rig).await;

    let result = session.decide(Decision::Fold).await;
    assert!(matches!(result, Err(SessionError::NoActiveRound)));
}

#[tokio::test]
async fn persisted_scenarios_record_the_outcome() -> anyhow::Result<()> {
    let rig = rig(
        CountingStore::new(MemoryScenarioStore::with_scenarios(batch("db", 5))),
        CountingCoach::offline(),
        quick_config(),
    );
    let mut session = start(&rig).await;

    let round = session.next_round().await?;
    assert_eq!(round.source, ScenarioSource::Database);
    assert!(round.has_id);
    assert_eq!(round.table.len(), 5);

    let outcome = session.decide(Decision::Raise).await?;
    assert!(outcome.correct);
    assert!(outcome.saved);
    assert_eq!(outcome.correct_action, Decision::Raise);
    assert_eq!(outcome.streak, 1);
    rig.pipeline.background().flush().await;

    assert_eq!(rig.store.inner.session_count(), 1);
    let record = rig.store.inner.scenario("db-0").expect("scenario served first");
    assert_eq!(record.used_count, 1);
    assert_eq!(record.success_rate, 1.0);

    let stored = rig.store.inner.get_player_progress(USER).await?.expect("progress saved");
    assert_eq!(stored.total_games, 1);
    assert_eq!(stored.correct_decisions, 1);
    Ok(())
}

#[tokio::test]
async fn a_wrong_answer_resets_the_streak() -> anyhow::Result<()> {
    let rig = rig(
        CountingStore::new(MemoryScenarioStore::with_scenarios(batch("db", 15))),
        CountingCoach::offline(),
        quick_config(),
    );
    let mut session = start(&rig).await;

    for expected in [1, 2] {
        session.next_round().await?;
        let outcome = session.decide(Decision::Raise).await?;
        assert_eq!(outcome.streak, expected);
    }
    session.next_round().await?;
    let outcome = session.decide(Decision::Fold).await?;
    assert!(!outcome.correct);
    assert_eq!(outcome.streak, 0);
    assert_eq!(session.progress().total_games, 3);
    assert_eq!(session.progress().correct_decisions, 2);
    Ok(())
}

#[tokio::test]
async fn the_shown_explanation_follows_the_fixed_answer() -> anyhow::Result<()> {
    let mut spot = training_scenario("kq-button", SkillLevel::Beginner);
    spot.hand = "Kh Qd".parse()?;
    let rig = rig(
        CountingStore::new(MemoryScenarioStore::with_scenarios(vec![spot])),
        CountingCoach::offline(),
        quick_config(),
    );
    let mut session = start(&rig).await;

    session.next_round().await?;
    let outcome = session.decide(Decision::Call).await?;

    assert!(!outcome.correct);
    assert!(outcome.evaluation.is_correct, "the rule table also accepts a call");
    assert!(!outcome.explanation.contains("Correct decision!"));
    insta::assert_snapshot!(outcome.explanation, @"Strong hand from the Button. Not the best decision. The answer for this spot is RAISE.");
    assert_eq!(outcome.rationale, "Premium hand on the button.");

    let line = plain_outcome(&outcome);
    assert!(line.starts_with("Incorrect: you chose CALL, answer RAISE."), "{line}");
    assert!(!line.contains("Correct decision!"));
    Ok(())
}

#[tokio::test]
async fn the_newest_progress_snapshot_wins() -> anyhow::Result<()> {
    let store = CountingStore {
        slow_progress_at: Some(1),
        ..CountingStore::new(MemoryScenarioStore::with_scenarios(batch("db", 5)))
    };
    let rig = rig(store, CountingCoach::offline(), quick_config());
    let mut session = start(&rig).await;

    for _ in 0..2 {
        session.next_round().await?;
        session.decide(Decision::Raise).await?;
    }
    rig.pipeline.background().flush().await;

    let stored = rig.store.inner.get_player_progress(USER).await?.expect("progress saved");
    assert_eq!(stored.total_games, 2);
    assert_eq!(stored.correct_decisions, 2);
    Ok(())
}

#[tokio::test]
async fn fallback_rounds_are_judged_but_not_saved() -> anyhow::Result<()> {
    let rig = rig(CountingStore::failing(), CountingCoach::offline(), quick_config());
    let mut session = start(&rig).await;
    assert!(session.is_offline());

    let round = session.next_round().await?;
    assert_eq!(round.source, ScenarioSource::Fallback);
    assert!(!round.has_id);

    let outcome = session.decide(Decision::Call).await?;
    assert!(!outcome.saved);
    assert_eq!(session.progress().total_games, 1);
    assert!(session.current_round().is_none());
    Ok(())
}

#[tokio::test]
async fn progress_analysis_runs_every_tenth_game() -> anyhow::Result<()> {
    let rig = rig(
        CountingStore::new(MemoryScenarioStore::new()),
        CountingCoach::mock(8),
        quick_config(),
    );
    let mut session = start(&rig).await;

    let mut requested = 0;
    for _ in 0..20 {
        session.next_round().await?;
        if session.decide(Decision::Fold).await?.analysis_requested {
            requested += 1;
        }
    }
    rig.pipeline.background().flush().await;

    assert_eq!(requested, 2);
    assert_eq!(rig.coach.analyses(), 2);
    assert!(session.latest_insight().is_some());
    Ok(())
}

#[tokio::test]
async fn coach_notes_and_questions_come_from_the_coach() -> anyhow::Result<()> {
    let rig = rig(
        CountingStore::new(MemoryScenarioStore::new()),
        CountingCoach::mock(4),
        quick_config(),
    );
    let config = SessionConfig {
        coach_notes: true,
        ..SessionConfig::default()
    };
    let mut session = TrainingSession::start(USER, rig.pipeline.clone(), config).await;

    session.next_round().await?;
    let question = session.coach_question().await;
    assert!(question.starts_with("Holding"), "{question}");

    let outcome = session.decide(Decision::Raise).await?;
    assert!(outcome.coach_notes.is_some());
    Ok(())
}

#[tokio::test]
async fn stats_and_diagnostics_reflect_recorded_sessions() -> anyhow::Result<()> {
    let rig = rig(
        CountingStore::new(MemoryScenarioStore::with_scenarios(batch("db", 15))),
        CountingCoach::offline(),
        quick_config(),
    );
    let mut session = start(&rig).await;

    for decision in [Decision::Raise, Decision::Fold, Decision::Raise] {
        session.next_round().await?;
        session.decide(decision).await?;
    }
    rig.pipeline.background().flush().await;

    let stats = session.detailed_stats(30).await;
    assert_eq!(stats.overview.total_games, 3);
    assert_eq!(stats.overview.correct_decisions, 2);
    assert_eq!(stats.overview.accuracy, 67);
    assert_eq!(stats.trends.len(), 7);
    assert_eq!(stats.trends.last().map(|t| t.games), Some(3));
    assert_eq!(stats.recent_sessions.len(), 3);

    session.next_round().await?;
    let diagnostics = session.diagnostics().await;
    assert!(diagnostics.store_connected);
    assert!(diagnostics.has_current_scenario);
    assert_eq!(diagnostics.current_source, Some(ScenarioSource::Cache));
    assert_eq!(diagnostics.cache.total_caches, 1);

    let snapshot = session.snapshot();
    assert_eq!(snapshot.progress.total_games, 3);
    assert!(snapshot.current.is_some());
    Ok(())
}
