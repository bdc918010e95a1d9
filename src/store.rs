//! Remote scenario/progress store seam and an in-memory implementation.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::time::{Duration, SystemTime};

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_with::{TimestampMilliSeconds, serde_as};
use uuid::Uuid;

use crate::cards::Hand;
use crate::game::Decision;
use crate::progress::{PlayerProgress, SkillLevel};
use crate::scenario::Scenario;

/// Where a served scenario came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioSource {
    Cache,
    Database,
    AiGenerated,
    Fallback,
}

impl Display for ScenarioSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ScenarioSource::Cache => "cache",
            ScenarioSource::Database => "database",
            ScenarioSource::AiGenerated => "ai_generated",
            ScenarioSource::Fallback => "fallback",
        })
    }
}

/// A ready-to-serve spot: hand, table state, and the precomputed answer.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingScenario {
    pub id: Option<String>,
    pub level: SkillLevel,
    pub focus_area: String,
    pub hand: Hand,
    pub scenario: Scenario,
    pub correct_action: Decision,
    pub explanation: String,
    pub difficulty: u8,
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub created_at: SystemTime,
    pub used_count: u32,
    pub success_rate: f32,
    /// Tier that originally produced the record.
    pub origin: ScenarioSource,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub user_id: String,
    pub scenario_id: String,
    pub decision: Decision,
    pub correct: bool,
    pub time_taken_ms: u64,
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub created_at: SystemTime,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("scenario {0} not found")]
    NotFound(String),
    #[error("malformed record: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub trait ScenarioStore: Send + Sync {
    /// Up to `limit` scenarios for the key, least used first.
    fn get_scenarios<'a>(
        &'a self,
        level: SkillLevel,
        focus_area: &'a str,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<TrainingScenario>, StoreError>>;

    fn save_scenario(
        &self,
        scenario: TrainingScenario,
    ) -> BoxFuture<'_, Result<String, StoreError>>;

    /// Bumps the usage count and folds the outcome into the rolling success rate.
    fn update_scenario_stats<'a>(
        &'a self,
        id: &'a str,
        was_correct: bool,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    fn get_player_progress<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<PlayerProgress>, StoreError>>;

    fn save_player_progress<'a>(
        &'a self,
        user_id: &'a str,
        progress: PlayerProgress,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    fn save_game_session(&self, record: SessionRecord) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Sessions from the last `since_days` days, newest first.
    fn get_player_stats<'a>(
        &'a self,
        user_id: &'a str,
        since_days: u32,
    ) -> BoxFuture<'a, Result<Vec<SessionRecord>, StoreError>>;

    fn ping(&self) -> BoxFuture<'_, Result<(), StoreError>>;
}

/// Rolling success rate after one more use.
pub fn next_success_rate(old_rate: f32, new_count: u32, was_correct: bool) -> f32 {
    if new_count == 0 {
        return old_rate;
    }
    let n = new_count as f32;
    (old_rate * (n - 1.0) + if was_correct { 1.0 } else { 0.0 }) / n
}

#[derive(Default)]
struct MemoryInner {
    scenarios: Vec<TrainingScenario>,
    progress: HashMap<String, PlayerProgress>,
    sessions: Vec<SessionRecord>,
}

/// Process-local store used by the CLI, the web server, and tests.
#[derive(Default)]
pub struct MemoryScenarioStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryScenarioStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scenarios(scenarios: Vec<TrainingScenario>) -> Self {
        let store = Self::new();
        store.inner.lock().scenarios = scenarios;
        store
    }

    pub fn scenario(&self, id: &str) -> Option<TrainingScenario> {
        self.inner
            .lock()
            .scenarios
            .iter()
            .find(|s| s.id.as_deref() == Some(id))
            .cloned()
    }

    pub fn scenario_count(&self) -> usize {
        self.inner.lock().scenarios.len()
    }

    pub fn session_count(&self) -> usize {
        self.inner.lock().sessions.len()
    }
}

impl ScenarioStore for MemoryScenarioStore {
    fn get_scenarios<'a>(
        &'a self,
        level: SkillLevel,
        focus_area: &'a str,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<TrainingScenario>, StoreError>> {
        let mut matching: Vec<TrainingScenario> = self
            .inner
            .lock()
            .scenarios
            .iter()
            .filter(|s| s.level == level && s.focus_area == focus_area)
            .cloned()
            .collect();
        matching.sort_by_key(|s| s.used_count);
        matching.truncate(limit);
        futures::future::ready(Ok(matching)).boxed()
    }

    fn save_scenario(
        &self,
        mut scenario: TrainingScenario,
    ) -> BoxFuture<'_, Result<String, StoreError>> {
        let id = scenario
            .id
            .get_or_insert_with(|| Uuid::new_v4().to_string())
            .clone();
        let mut inner = self.inner.lock();
        inner.scenarios.retain(|s| s.id.as_deref() != Some(id.as_str()));
        inner.scenarios.push(scenario);
        futures::future::ready(Ok(id)).boxed()
    }

    fn update_scenario_stats<'a>(
        &'a self,
        id: &'a str,
        was_correct: bool,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        let mut inner = self.inner.lock();
        let result = match inner
            .scenarios
            .iter_mut()
            .find(|s| s.id.as_deref() == Some(id))
        {
            Some(record) => {
                record.used_count += 1;
                record.success_rate =
                    next_success_rate(record.success_rate, record.used_count, was_correct);
                Ok(())
            }
            None => Err(StoreError::NotFound(id.to_string())),
        };
        futures::future::ready(result).boxed()
    }

    fn get_player_progress<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<PlayerProgress>, StoreError>> {
        let progress = self.inner.lock().progress.get(user_id).cloned();
        futures::future::ready(Ok(progress)).boxed()
    }

    fn save_player_progress<'a>(
        &'a self,
        user_id: &'a str,
        progress: PlayerProgress,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        self.inner
            .lock()
            .progress
            .insert(user_id.to_string(), progress);
        futures::future::ready(Ok(())).boxed()
    }

    fn save_game_session(&self, record: SessionRecord) -> BoxFuture<'_, Result<(), StoreError>> {
        self.inner.lock().sessions.push(record);
        futures::future::ready(Ok(())).boxed()
    }

    fn get_player_stats<'a>(
        &'a self,
        user_id: &'a str,
        since_days: u32,
    ) -> BoxFuture<'a, Result<Vec<SessionRecord>, StoreError>> {
        let window = Duration::from_secs(u64::from(since_days) * 24 * 60 * 60);
        let cutoff = SystemTime::now()
            .checked_sub(window)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let mut sessions: Vec<SessionRecord> = self
            .inner
            .lock()
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id && s.created_at >= cutoff)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        futures::future::ready(Ok(sessions)).boxed()
    }

    fn ping(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        futures::future::ready(Ok(())).boxed()
    }
}
