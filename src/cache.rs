use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use itertools::Itertools;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_with::{DurationSeconds, TimestampMilliSeconds, serde_as};
use tracing::{debug, warn};

use crate::kv::{KeyValueStore, KvError};
use crate::progress::SkillLevel;
use crate::store::TrainingScenario;

pub const CACHE_PREFIX: &str = "poker_scenarios_";

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Below this many entries a background refill is requested.
    pub min_size: usize,
    pub max_size: usize,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub expiry: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            min_size: 10,
            max_size: 30,
            expiry: Duration::from_secs(24 * 60 * 60),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error(transparent)]
    Kv(#[from] KvError),
    #[error("cache entry is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedPool {
    scenarios: Vec<TrainingScenario>,
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    timestamp: SystemTime,
    level: SkillLevel,
    focus_area: String,
}

#[derive(Debug, Clone)]
pub struct PoolLookup {
    pub scenarios: Vec<TrainingScenario>,
    pub needs_refresh: bool,
}

#[derive(Debug, Clone)]
pub struct Popped {
    pub scenario: TrainingScenario,
    pub remaining: usize,
    pub needs_refresh: bool,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PoolStats {
    pub key: String,
    pub level: SkillLevel,
    pub focus_area: String,
    pub scenario_count: usize,
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub last_updated: SystemTime,
    pub is_expired: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CacheStats {
    pub total_caches: usize,
    pub pools: Vec<PoolStats>,
}

pub fn cache_key(level: SkillLevel, focus_area: &str) -> String {
    format!(
        "{CACHE_PREFIX}{}_{}",
        level.key(),
        focus_area.split_whitespace().join("_")
    )
}

/// Scenario pools per `(level, focus area)` on top of a key-value store.
/// Every read-modify-write holds that key's lock, so concurrent pops never
/// hand out the same entry.
pub struct ScenarioCache {
    kv: Arc<dyn KeyValueStore>,
    config: CacheConfig,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ScenarioCache {
    pub fn new(kv: Arc<dyn KeyValueStore>, config: CacheConfig) -> Self {
        Self {
            kv,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn key_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    fn is_expired(&self, pool: &CachedPool) -> bool {
        SystemTime::now()
            .duration_since(pool.timestamp)
            .is_ok_and(|age| age > self.config.expiry)
    }

    /// Missing, unreadable, and corrupt pools all read as `None`.
    async fn read_pool(&self, key: &str) -> Option<CachedPool> {
        let raw = match self.kv.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(key, error = %err, "cache read failed; treating as miss");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(pool) => Some(pool),
            Err(err) => {
                warn!(key, error = %err, "corrupt cache entry; treating as miss");
                None
            }
        }
    }

    async fn write_pool(&self, key: &str, mut pool: CachedPool) -> Result<usize, CacheError> {
        pool.scenarios.truncate(self.config.max_size);
        let count = pool.scenarios.len();
        let raw = serde_json::to_string(&pool)?;
        self.kv.set(key, raw).await?;
        debug!(key, count, "cache pool saved");
        Ok(count)
    }

    /// Non-expired pool contents. Expired or missing pools come back empty.
    pub async fn lookup(&self, level: SkillLevel, focus_area: &str) -> PoolLookup {
        let key = cache_key(level, focus_area);
        match self.read_pool(&key).await {
            Some(pool) if !self.is_expired(&pool) => {
                let needs_refresh = pool.scenarios.len() < self.config.min_size;
                PoolLookup {
                    scenarios: pool.scenarios,
                    needs_refresh,
                }
            }
            _ => PoolLookup {
                scenarios: Vec::new(),
                needs_refresh: true,
            },
        }
    }

    /// Removes the entry at `pick(len)` from a live pool and persists the rest.
    /// The pool keeps its original timestamp.
    pub async fn pop_with<P>(
        &self,
        level: SkillLevel,
        focus_area: &str,
        pick: P,
    ) -> Option<Popped>
    where
        P: FnOnce(usize) -> usize,
    {
        let key = cache_key(level, focus_area);
        let lock = self.key_lock(&key);
        let _guard = lock.lock().await;

        let mut pool = self.read_pool(&key).await?;
        if self.is_expired(&pool) {
            debug!(key, "cache pool expired");
            return None;
        }
        if pool.scenarios.is_empty() {
            return None;
        }

        let index = pick(pool.scenarios.len()).min(pool.scenarios.len() - 1);
        let scenario = pool.scenarios.remove(index);
        let remaining = pool.scenarios.len();
        if let Err(err) = self.write_pool(&key, pool).await {
            warn!(key, error = %err, "failed to persist reduced cache pool");
        }

        Some(Popped {
            scenario,
            remaining,
            needs_refresh: remaining < self.config.min_size,
        })
    }

    /// Hands out the first incoming entry and pools the rest. A live pool
    /// written since the caller's miss is kept: incoming entries it already
    /// holds (by id) are skipped, and the rest are appended.
    pub async fn seed_and_take(
        &self,
        level: SkillLevel,
        focus_area: &str,
        scenarios: Vec<TrainingScenario>,
    ) -> Option<TrainingScenario> {
        if scenarios.is_empty() {
            return None;
        }
        let key = cache_key(level, focus_area);
        let lock = self.key_lock(&key);
        let _guard = lock.lock().await;

        let mut pooled = match self.read_pool(&key).await {
            Some(pool) if !self.is_expired(&pool) => pool.scenarios,
            _ => Vec::new(),
        };
        let mut fresh = scenarios
            .into_iter()
            .filter(|candidate| {
                candidate.id.is_none() || pooled.iter().all(|existing| existing.id != candidate.id)
            })
            .collect::<Vec<_>>();
        let first = if fresh.is_empty() {
            debug!(key, "incoming scenarios already pooled; taking from the pool");
            if pooled.is_empty() {
                return None;
            }
            pooled.remove(0)
        } else {
            fresh.remove(0)
        };
        pooled.extend(fresh);

        let pool = CachedPool {
            scenarios: pooled,
            timestamp: SystemTime::now(),
            level,
            focus_area: focus_area.to_string(),
        };
        if let Err(err) = self.write_pool(&key, pool).await {
            warn!(key, error = %err, "failed to seed cache pool");
        }
        Some(first)
    }

    /// Appends entries not already pooled (by id) to the live pool.
    pub async fn merge(
        &self,
        level: SkillLevel,
        focus_area: &str,
        extra: Vec<TrainingScenario>,
    ) -> Result<usize, CacheError> {
        let key = cache_key(level, focus_area);
        let lock = self.key_lock(&key);
        let _guard = lock.lock().await;

        let mut scenarios = match self.read_pool(&key).await {
            Some(pool) if !self.is_expired(&pool) => pool.scenarios,
            _ => Vec::new(),
        };
        for candidate in extra {
            let duplicate = candidate.id.is_some()
                && scenarios.iter().any(|existing| existing.id == candidate.id);
            if !duplicate {
                scenarios.push(candidate);
            }
        }
        let pool = CachedPool {
            scenarios,
            timestamp: SystemTime::now(),
            level,
            focus_area: focus_area.to_string(),
        };
        self.write_pool(&key, pool).await
    }

    pub async fn stats(&self) -> CacheStats {
        let keys = match self.kv.keys().await {
            Ok(keys) => keys,
            Err(err) => {
                warn!(error = %err, "failed to list cache keys");
                return CacheStats::default();
            }
        };

        let mut pools = Vec::new();
        for key in keys.into_iter().filter(|k| k.starts_with(CACHE_PREFIX)) {
            if let Some(pool) = self.read_pool(&key).await {
                pools.push(PoolStats {
                    is_expired: self.is_expired(&pool),
                    scenario_count: pool.scenarios.len(),
                    level: pool.level,
                    focus_area: pool.focus_area,
                    last_updated: pool.timestamp,
                    key,
                });
            }
        }
        CacheStats {
            total_caches: pools.len(),
            pools,
        }
    }

    /// Clears one pool, or every pool under the cache prefix when `scope` is `None`.
    /// Returns how many keys were removed.
    pub async fn clear(&self, scope: Option<(SkillLevel, &str)>) -> Result<usize, CacheError> {
        let keys = match scope {
            Some((level, focus_area)) => vec![cache_key(level, focus_area)],
            None => self
                .kv
                .keys()
                .await?
                .into_iter()
                .filter(|k| k.starts_with(CACHE_PREFIX))
                .collect(),
        };
        for key in &keys {
            let lock = self.key_lock(key);
            let _guard = lock.lock().await;
            self.kv.remove(key).await?;
        }
        debug!(count = keys.len(), "cache cleared");
        Ok(keys.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_collapse_whitespace() {
        assert_eq!(
            cache_key(SkillLevel::Beginner, "pre-flop  basics"),
            "poker_scenarios_beginner_pre-flop_basics"
        );
    }
}
