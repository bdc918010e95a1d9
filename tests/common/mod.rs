#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use futures::future::{BoxFuture, FutureExt};
use preflop_coach::cache::{CacheConfig, ScenarioCache};
use preflop_coach::coach::{Coach, CoachError, MockCoach, OfflineCoach, ScenarioDraft};
use preflop_coach::game::{Decision, SeatAction};
use preflop_coach::kv::{KeyValueStore, MemoryKv};
use preflop_coach::pipeline::{PipelineConfig, ScenarioPipeline};
use preflop_coach::position::Position;
use preflop_coach::progress::{GameEntry, PlayerProgress, SkillLevel};
use preflop_coach::scenario::Scenario;
use preflop_coach::store::{
    MemoryScenarioStore, ScenarioSource, ScenarioStore, SessionRecord, StoreError, TrainingScenario,
};
use preflop_coach::cards::Hand;

pub const FOCUS: &str = "pre-flop basics";

pub fn training_scenario(id: &str, level: SkillLevel) -> TrainingScenario {
    TrainingScenario {
        id: Some(id.to_string()),
        level,
        focus_area: FOCUS.to_string(),
        hand: "As Ks".parse().expect("valid hand"),
        scenario: Scenario {
            position: Position::Btn,
            pot: 4.5,
            to_call: 2.0,
            is_raised: true,
            num_callers: 0,
            players_in_hand: 4,
            actions_before: vec![SeatAction::Raise],
            phase: Default::default(),
        },
        correct_action: Decision::Raise,
        explanation: "Premium hand on the button.".to_string(),
        difficulty: 2,
        created_at: SystemTime::now(),
        used_count: 0,
        success_rate: 0.0,
        origin: ScenarioSource::Database,
    }
}

pub fn batch(prefix: &str, count: usize) -> Vec<TrainingScenario> {
    (0..count)
        .map(|i| training_scenario(&format!("{prefix}-{i}"), SkillLevel::Beginner))
        .collect()
}

/// Store wrapper that counts calls and can be switched to fail, hang, or
/// answer slowly.
pub struct CountingStore {
    pub inner: MemoryScenarioStore,
    pub get_calls: AtomicUsize,
    pub failing: bool,
    pub hanging: bool,
    /// Delay before `get_scenarios` reaches the inner store.
    pub get_delay: Option<Duration>,
    /// Delays the progress save whose snapshot has this many games.
    pub slow_progress_at: Option<u32>,
}

impl CountingStore {
    pub fn new(inner: MemoryScenarioStore) -> Self {
        Self {
            inner,
            get_calls: AtomicUsize::new(0),
            failing: false,
            hanging: false,
            get_delay: None,
            slow_progress_at: None,
        }
    }

    pub fn slow_gets(inner: MemoryScenarioStore, delay: Duration) -> Self {
        Self {
            get_delay: Some(delay),
            ..Self::new(inner)
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new(MemoryScenarioStore::new())
        }
    }

    pub fn hanging() -> Self {
        Self {
            hanging: true,
            ..Self::new(MemoryScenarioStore::new())
        }
    }

    pub fn gets(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    fn gate<'a, T: Send + 'a>(
        &'a self,
        call: impl FnOnce() -> BoxFuture<'a, Result<T, StoreError>>,
    ) -> BoxFuture<'a, Result<T, StoreError>> {
        if self.hanging {
            futures::future::pending().boxed()
        } else if self.failing {
            futures::future::ready(Err(StoreError::Unavailable("down".to_string()))).boxed()
        } else {
            call()
        }
    }

    fn delayed<'a, T: Send + 'a>(
        &'a self,
        delay: Option<Duration>,
        call: impl FnOnce() -> BoxFuture<'a, Result<T, StoreError>> + Send + 'a,
    ) -> BoxFuture<'a, Result<T, StoreError>> {
        match delay {
            Some(delay) => async move {
                tokio::time::sleep(delay).await;
                self.gate(call).await
            }
            .boxed(),
            None => self.gate(call),
        }
    }
}

impl ScenarioStore for CountingStore {
    fn get_scenarios<'a>(
        &'a self,
        level: SkillLevel,
        focus_area: &'a str,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<TrainingScenario>, StoreError>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.delayed(self.get_delay, move || {
            self.inner.get_scenarios(level, focus_area, limit)
        })
    }

    fn save_scenario(
        &self,
        scenario: TrainingScenario,
    ) -> BoxFuture<'_, Result<String, StoreError>> {
        self.gate(|| self.inner.save_scenario(scenario))
    }

    fn update_scenario_stats<'a>(
        &'a self,
        id: &'a str,
        was_correct: bool,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        self.gate(|| self.inner.update_scenario_stats(id, was_correct))
    }

    fn get_player_progress<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<PlayerProgress>, StoreError>> {
        self.gate(|| self.inner.get_player_progress(user_id))
    }

    fn save_player_progress<'a>(
        &'a self,
        user_id: &'a str,
        progress: PlayerProgress,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        let delay = (self.slow_progress_at == Some(progress.total_games))
            .then(|| Duration::from_millis(50));
        self.delayed(delay, move || self.inner.save_player_progress(user_id, progress))
    }

    fn save_game_session(&self, record: SessionRecord) -> BoxFuture<'_, Result<(), StoreError>> {
        self.gate(|| self.inner.save_game_session(record))
    }

    fn get_player_stats<'a>(
        &'a self,
        user_id: &'a str,
        since_days: u32,
    ) -> BoxFuture<'a, Result<Vec<SessionRecord>, StoreError>> {
        self.gate(|| self.inner.get_player_stats(user_id, since_days))
    }

    fn ping(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        self.gate(|| self.inner.ping())
    }
}

/// Coach wrapper that counts scenario requests and progress analyses.
pub struct CountingCoach {
    inner: Box<dyn Coach>,
    pub scenario_calls: AtomicUsize,
    pub analysis_calls: AtomicUsize,
}

impl CountingCoach {
    pub fn mock(seed: u64) -> Self {
        Self::wrap(Box::new(MockCoach::new(Some(seed))))
    }

    pub fn offline() -> Self {
        Self::wrap(Box::new(OfflineCoach))
    }

    fn wrap(inner: Box<dyn Coach>) -> Self {
        Self {
            inner,
            scenario_calls: AtomicUsize::new(0),
            analysis_calls: AtomicUsize::new(0),
        }
    }

    pub fn scenarios(&self) -> usize {
        self.scenario_calls.load(Ordering::SeqCst)
    }

    pub fn analyses(&self) -> usize {
        self.analysis_calls.load(Ordering::SeqCst)
    }
}

impl Coach for CountingCoach {
    fn generate_scenario<'a>(
        &'a self,
        level: SkillLevel,
        focus_area: &'a str,
    ) -> BoxFuture<'a, Result<ScenarioDraft, CoachError>> {
        self.scenario_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.generate_scenario(level, focus_area)
    }

    fn generate_question<'a>(
        &'a self,
        hand: &'a Hand,
        scenario: &'a Scenario,
        history: &'a [GameEntry],
    ) -> BoxFuture<'a, Result<String, CoachError>> {
        self.inner.generate_question(hand, scenario, history)
    }

    fn analyze_progress<'a>(
        &'a self,
        history: &'a [GameEntry],
        level: SkillLevel,
    ) -> BoxFuture<'a, Result<String, CoachError>> {
        self.analysis_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.analyze_progress(history, level)
    }

    fn analyze_hand<'a>(
        &'a self,
        hand: &'a Hand,
        scenario: &'a Scenario,
        decision: Decision,
    ) -> BoxFuture<'a, Result<String, CoachError>> {
        self.inner.analyze_hand(hand, scenario, decision)
    }
}

pub struct Rig {
    pub pipeline: ScenarioPipeline,
    pub store: Arc<CountingStore>,
    pub coach: Arc<CountingCoach>,
    pub kv: Arc<MemoryKv>,
}

pub fn rig(store: CountingStore, coach: CountingCoach, config: PipelineConfig) -> Rig {
    let store = Arc::new(store);
    let coach = Arc::new(coach);
    let kv = Arc::new(MemoryKv::new());
    let cache = Arc::new(ScenarioCache::new(
        Arc::clone(&kv) as Arc<dyn KeyValueStore>,
        config.cache.clone(),
    ));
    let pipeline = ScenarioPipeline::new(
        cache,
        Arc::clone(&store) as Arc<dyn ScenarioStore>,
        Arc::clone(&coach) as Arc<dyn Coach>,
        config,
    );
    Rig {
        pipeline,
        store,
        coach,
        kv,
    }
}

pub fn quick_config() -> PipelineConfig {
    PipelineConfig {
        collaborator_timeout: Duration::from_millis(100),
        seed: Some(99),
        cache: CacheConfig::default(),
        ..PipelineConfig::default()
    }
}
