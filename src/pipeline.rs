//! Scenario supply: cache, then database, then coach generation, then a local
//! fallback. Refills run in the background and never block the caller.

use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};
use tracing::{debug, info, warn};

use crate::cache::{CacheConfig, CacheError, ScenarioCache, cache_key};
use crate::cards::{Hand, Rank, deal_hand};
use crate::coach::{Coach, CoachError};
use crate::game::Decision;
use crate::progress::SkillLevel;
use crate::scenario::{GeneratorKind, Scenario};
use crate::store::{ScenarioSource, ScenarioStore, TrainingScenario};
use crate::tasks::Background;

pub const FALLBACK_EXPLANATION: &str = "Scenario generated locally without the coach.";

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub db_fetch_limit: usize,
    pub refill_db_limit: usize,
    pub ai_batch: usize,
    pub refill_ai_batch: usize,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub collaborator_timeout: Duration,
    pub allow_local_fallback: bool,
    pub fallback_generator: GeneratorKind,
    pub cache: CacheConfig,
    pub seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            db_fetch_limit: 15,
            refill_db_limit: 10,
            ai_batch: 3,
            refill_ai_batch: 2,
            collaborator_timeout: Duration::from_secs(5),
            allow_local_fallback: true,
            fallback_generator: GeneratorKind::Uniform,
            cache: CacheConfig::default(),
            seed: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no scenario could be produced for {level} / {focus_area}")]
    Exhausted { level: SkillLevel, focus_area: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServedScenario {
    pub scenario: TrainingScenario,
    pub source: ScenarioSource,
}

impl ServedScenario {
    /// Persisted scenarios carry an id and get their outcome recorded.
    pub fn has_id(&self) -> bool {
        self.scenario.id.is_some() && self.source != ScenarioSource::Fallback
    }
}

#[derive(Clone)]
pub struct ScenarioPipeline {
    cache: Arc<ScenarioCache>,
    store: Arc<dyn ScenarioStore>,
    coach: Arc<dyn Coach>,
    config: PipelineConfig,
    rng: Arc<Mutex<StdRng>>,
    background: Background,
    refilling: Arc<Mutex<HashSet<String>>>,
    /// One cold fill per key at a time.
    filling: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl ScenarioPipeline {
    pub fn new(
        cache: Arc<ScenarioCache>,
        store: Arc<dyn ScenarioStore>,
        coach: Arc<dyn Coach>,
        config: PipelineConfig,
    ) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        Self {
            cache,
            store,
            coach,
            config,
            rng: Arc::new(Mutex::new(StdRng::seed_from_u64(seed))),
            background: Background::new(),
            refilling: Arc::new(Mutex::new(HashSet::new())),
            filling: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn cache(&self) -> &Arc<ScenarioCache> {
        &self.cache
    }

    pub fn store(&self) -> &Arc<dyn ScenarioStore> {
        &self.store
    }

    pub fn coach(&self) -> &Arc<dyn Coach> {
        &self.coach
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn background(&self) -> &Background {
        &self.background
    }

    /// Runs `fut` under the collaborator timeout. Errors and timeouts are
    /// logged and collapse to `None`.
    pub async fn bounded<T, E, F>(&self, what: &'static str, fut: F) -> Option<T>
    where
        F: Future<Output = Result<T, E>>,
        E: Display,
    {
        match tokio::time::timeout(self.config.collaborator_timeout, fut).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) => {
                warn!(call = what, error = %err, "collaborator call failed");
                None
            }
            Err(_) => {
                warn!(
                    call = what,
                    timeout = ?self.config.collaborator_timeout,
                    "collaborator call timed out"
                );
                None
            }
        }
    }

    /// Resolves one scenario, trying each tier strictly in order. Callers
    /// that miss the cache for the same key fill it one at a time, and each
    /// checks the cache again once it holds the gate.
    pub async fn next_scenario(
        &self,
        level: SkillLevel,
        focus_area: &str,
    ) -> Result<ServedScenario, PipelineError> {
        if let Some(served) = self.from_cache(level, focus_area).await {
            return Ok(served);
        }
        let gate = self.fill_gate(&cache_key(level, focus_area));
        let _filling = gate.lock().await;
        if let Some(served) = self.from_cache(level, focus_area).await {
            debug!(%level, focus_area, "pool was filled while waiting");
            return Ok(served);
        }
        if let Some(served) = self.from_database(level, focus_area).await {
            return Ok(served);
        }
        if let Some(served) = self.from_coach(level, focus_area).await {
            return Ok(served);
        }
        if self.config.allow_local_fallback {
            info!(%level, focus_area, "serving locally generated fallback scenario");
            return Ok(ServedScenario {
                scenario: self.local_fallback(level, focus_area),
                source: ScenarioSource::Fallback,
            });
        }
        Err(PipelineError::Exhausted {
            level,
            focus_area: focus_area.to_string(),
        })
    }

    fn fill_gate(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.filling
            .lock()
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    async fn from_cache(&self, level: SkillLevel, focus_area: &str) -> Option<ServedScenario> {
        let rng = Arc::clone(&self.rng);
        let popped = self
            .cache
            .pop_with(level, focus_area, move |len| rng.lock().gen_range(0..len))
            .await?;
        debug!(%level, focus_area, remaining = popped.remaining, "serving scenario from cache");
        if popped.needs_refresh {
            self.spawn_refill(level, focus_area);
        }
        Some(ServedScenario {
            scenario: popped.scenario,
            source: ScenarioSource::Cache,
        })
    }

    async fn from_database(&self, level: SkillLevel, focus_area: &str) -> Option<ServedScenario> {
        let fetched = self
            .bounded(
                "get_scenarios",
                self.store
                    .get_scenarios(level, focus_area, self.config.db_fetch_limit),
            )
            .await
            .unwrap_or_default();
        if fetched.is_empty() {
            debug!(%level, focus_area, "database has no scenarios");
            return None;
        }
        info!(%level, focus_area, count = fetched.len(), "loaded scenarios from database");
        let first = self.cache.seed_and_take(level, focus_area, fetched).await?;
        Some(ServedScenario {
            scenario: first,
            source: ScenarioSource::Database,
        })
    }

    async fn from_coach(&self, level: SkillLevel, focus_area: &str) -> Option<ServedScenario> {
        let generated = self
            .generate_batch(level, focus_area, self.config.ai_batch)
            .await;
        if generated.is_empty() {
            return None;
        }
        info!(%level, focus_area, count = generated.len(), "generated scenarios with coach");
        let first = self
            .cache
            .seed_and_take(level, focus_area, generated)
            .await?;
        Some(ServedScenario {
            scenario: first,
            source: ScenarioSource::AiGenerated,
        })
    }

    /// Asks the coach for `count` drafts. Each success gets a synthetic id and
    /// zeroed counters and is saved to the store in the background.
    pub async fn generate_batch(
        &self,
        level: SkillLevel,
        focus_area: &str,
        count: usize,
    ) -> Vec<TrainingScenario> {
        let mut generated = Vec::with_capacity(count);
        for attempt in 0..count {
            let draft = match self
                .bounded(
                    "generate_scenario",
                    self.coach.generate_scenario(level, focus_area),
                )
                .await
            {
                Some(draft) => draft,
                None => continue,
            };
            if let Err(err) = draft.scenario.check_invariants() {
                let err = CoachError::MalformedDraft(err.to_string());
                warn!(attempt, error = %err, "discarding coach draft");
                continue;
            }

            let record = TrainingScenario {
                id: Some(format!("ai_{}", uuid::Uuid::new_v4().simple())),
                level,
                focus_area: focus_area.to_string(),
                hand: draft.hand,
                scenario: draft.scenario,
                correct_action: draft.correct_action.normalized(),
                explanation: draft.explanation,
                difficulty: draft.difficulty,
                created_at: SystemTime::now(),
                used_count: 0,
                success_rate: 0.0,
                origin: ScenarioSource::AiGenerated,
            };

            let store = Arc::clone(&self.store);
            let to_save = record.clone();
            self.background
                .spawn("save_scenario", async move { store.save_scenario(to_save).await });
            generated.push(record);
        }
        generated
    }

    /// Starts a refill for the key unless one is already running.
    pub fn spawn_refill(&self, level: SkillLevel, focus_area: &str) {
        let key = cache_key(level, focus_area);
        if !self.refilling.lock().insert(key.clone()) {
            debug!(key, "refill already in flight");
            return;
        }
        let pipeline = self.clone();
        let focus_area = focus_area.to_string();
        self.background.spawn("cache_refill", async move {
            let result = pipeline.refill(level, &focus_area).await;
            pipeline.refilling.lock().remove(&key);
            result
        });
    }

    /// Database first, coach second; whatever arrives is merged into the pool.
    pub async fn refill(
        &self,
        level: SkillLevel,
        focus_area: &str,
    ) -> Result<usize, CacheError> {
        info!(%level, focus_area, "refilling cache in background");
        let mut fresh = self
            .bounded(
                "get_scenarios",
                self.store
                    .get_scenarios(level, focus_area, self.config.refill_db_limit),
            )
            .await
            .unwrap_or_default();
        if fresh.is_empty() {
            fresh = self
                .generate_batch(level, focus_area, self.config.refill_ai_batch)
                .await;
        }
        if fresh.is_empty() {
            debug!(%level, focus_area, "refill found nothing new");
            return Ok(0);
        }
        self.cache.merge(level, focus_area, fresh).await
    }

    /// Uniform/pot-accurate spot with a random hand, judged by the crude heuristic.
    pub fn local_fallback(&self, level: SkillLevel, focus_area: &str) -> TrainingScenario {
        let (hand, scenario) = {
            let mut rng = self.rng.lock();
            let hand = deal_hand(&mut *rng);
            let scenario = self.config.fallback_generator.generate(&mut *rng);
            (hand, scenario)
        };
        TrainingScenario {
            id: None,
            level,
            focus_area: focus_area.to_string(),
            correct_action: fallback_action(&hand, &scenario),
            hand,
            scenario,
            explanation: FALLBACK_EXPLANATION.to_string(),
            difficulty: 5,
            created_at: SystemTime::now(),
            used_count: 0,
            success_rate: 0.0,
            origin: ScenarioSource::Fallback,
        }
    }
}

/// Emergency heuristic, deliberately coarser than the evaluator's table:
/// pair-rank thresholds and ace-plus-broadway, otherwise call unraised pots.
pub fn fallback_action(hand: &Hand, scenario: &Scenario) -> Decision {
    let (high, low) = hand.high_low();
    if hand.is_pair() {
        return if high.rank >= Rank::Jack {
            Decision::Raise
        } else if high.rank >= Rank::Eight {
            Decision::Call
        } else {
            Decision::Fold
        };
    }

    if high.rank == Rank::Ace {
        return match (low.rank >= Rank::Ten, scenario.is_raised) {
            (true, true) => Decision::Call,
            (true, false) => Decision::Raise,
            (false, true) => Decision::Fold,
            (false, false) => Decision::Call,
        };
    }

    if scenario.is_raised {
        Decision::Fold
    } else {
        Decision::Call
    }
}
