use std::sync::Arc;
use std::time::{Instant, SystemTime};

use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::CacheStats;
use crate::cards::Hand;
use crate::coach::{FALLBACK_ANALYSIS, FALLBACK_QUESTION};
use crate::evaluator::{Evaluation, evaluate, explain_against};
use crate::game::{Decision, SeatAction};
use crate::pipeline::{PipelineError, ScenarioPipeline, ServedScenario};
use crate::position::Position;
use crate::progress::{
    ANALYSIS_WINDOW, DetailedStats, GameEntry, PlayerProgress, SkillLevel, summarize_sessions,
};
use crate::scenario::Scenario;
use crate::store::{ScenarioSource, SessionRecord};
use crate::strength::classify_hand;
use crate::table::TableProfile;

/// Per-session knobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Ask the coach for a narrative after each decision.
    pub coach_notes: bool,
    pub table: TableProfile,
    pub seed: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no scenario is in flight")]
    NoActiveRound,
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// What the player sees for one round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundView {
    pub round: u32,
    pub hand: Hand,
    pub scenario: Scenario,
    pub source: ScenarioSource,
    pub has_id: bool,
    /// Presentation-only actions for the other seats, in seat order.
    pub table: Vec<(Position, SeatAction)>,
    pub choices: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionOutcome {
    pub decision: Decision,
    pub correct: bool,
    pub correct_action: Decision,
    /// Agrees with `correct`.
    pub explanation: String,
    /// The note stored with the scenario when it was generated.
    pub rationale: String,
    /// The rule table's reading of the same decision; it may accept more
    /// than the scenario's fixed answer.
    pub evaluation: Evaluation,
    pub time_taken_ms: u64,
    pub source: ScenarioSource,
    pub saved: bool,
    pub coach_notes: Option<String>,
    pub streak: u32,
    pub analysis_requested: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressSummary {
    pub level: SkillLevel,
    pub current_focus: String,
    pub total_games: u32,
    pub correct_decisions: u32,
    pub streak: u32,
    pub accuracy: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionState {
    pub session_id: Uuid,
    pub user_id: String,
    pub offline: bool,
    pub progress: ProgressSummary,
    pub current: Option<RoundView>,
    pub insight: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Diagnostics {
    pub session_id: Uuid,
    pub user_id: String,
    pub has_current_scenario: bool,
    pub current_source: Option<ScenarioSource>,
    pub current_has_id: bool,
    pub store_connected: bool,
    pub pending_background_tasks: usize,
    pub cache: CacheStats,
}

struct Round {
    served: ServedScenario,
    view: RoundView,
    issued_at: Instant,
}

/// One player's training flow: at most one scenario in flight at a time.
pub struct TrainingSession {
    id: Uuid,
    user_id: String,
    pipeline: ScenarioPipeline,
    config: SessionConfig,
    rng: StdRng,
    progress: PlayerProgress,
    offline: bool,
    rounds: u32,
    current: Option<Round>,
    insight: Arc<Mutex<Option<String>>>,
    progress_version: u64,
    progress_written: Arc<tokio::sync::Mutex<u64>>,
}

impl TrainingSession {
    /// Loads stored progress, creating and saving defaults for a new player.
    /// An unreachable store leaves the session offline with defaults.
    pub async fn start(
        user_id: impl Into<String>,
        pipeline: ScenarioPipeline,
        config: SessionConfig,
    ) -> Self {
        let user_id = user_id.into();
        let store = Arc::clone(pipeline.store());
        let connected = pipeline.bounded("ping", store.ping()).await.is_some();

        let (progress, offline) = if !connected {
            warn!(user_id, "store unreachable; running offline");
            (PlayerProgress::default(), true)
        } else {
            match pipeline
                .bounded("get_player_progress", store.get_player_progress(&user_id))
                .await
            {
                Some(Some(progress)) => {
                    info!(user_id, total_games = progress.total_games, "loaded player progress");
                    (progress, false)
                }
                Some(None) => {
                    info!(user_id, "new player; creating profile");
                    let progress = PlayerProgress::default();
                    pipeline
                        .bounded(
                            "save_player_progress",
                            store.save_player_progress(&user_id, progress.clone()),
                        )
                        .await;
                    (progress, false)
                }
                None => (PlayerProgress::default(), true),
            }
        };

        let seed = config.seed.unwrap_or_else(rand::random);
        Self {
            id: Uuid::new_v4(),
            user_id,
            pipeline,
            config,
            rng: StdRng::seed_from_u64(seed),
            progress,
            offline,
            rounds: 0,
            current: None,
            insight: Arc::new(Mutex::new(None)),
            progress_version: 0,
            progress_written: Arc::new(tokio::sync::Mutex::new(0)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    pub fn progress(&self) -> &PlayerProgress {
        &self.progress
    }

    pub fn pipeline(&self) -> &ScenarioPipeline {
        &self.pipeline
    }

    pub fn latest_insight(&self) -> Option<String> {
        self.insight.lock().clone()
    }

    pub fn set_training(&mut self, level: SkillLevel, focus_area: impl Into<String>) {
        self.progress.level = level;
        self.progress.current_focus = focus_area.into();
    }

    pub fn current_round(&self) -> Option<&RoundView> {
        self.current.as_ref().map(|round| &round.view)
    }

    /// Fetches the next scenario, replacing any unanswered one.
    pub async fn next_round(&mut self) -> Result<RoundView, SessionError> {
        let level = self.progress.level;
        let focus_area = self.progress.current_focus.clone();
        let served = self.pipeline.next_scenario(level, &focus_area).await?;
        debug!(source = %served.source, "scenario served");

        self.rounds += 1;
        let spot = &served.scenario.scenario;
        let view = RoundView {
            round: self.rounds,
            hand: served.scenario.hand,
            scenario: spot.clone(),
            source: served.source,
            has_id: served.has_id(),
            table: self
                .config
                .table
                .seat_actions(spot.position, &mut self.rng)
                .into_iter()
                .collect(),
            choices: Decision::CHOICES
                .iter()
                .map(|choice| choice.display_label(spot.to_call).to_string())
                .collect(),
        };
        self.current = Some(Round {
            served,
            view: view.clone(),
            issued_at: Instant::now(),
        });
        Ok(view)
    }

    /// Judges the in-flight scenario against its precomputed answer, folds the
    /// outcome into progress, and records it when the scenario is persisted.
    pub async fn decide(&mut self, decision: Decision) -> Result<DecisionOutcome, SessionError> {
        let round = self.current.take().ok_or(SessionError::NoActiveRound)?;
        let time_taken_ms =
            u64::try_from(round.issued_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        let record = &round.served.scenario;
        let correct = decision.matches(record.correct_action);
        let explanation = explain_against(
            classify_hand(&record.hand),
            &record.scenario,
            decision,
            record.correct_action,
        );
        let evaluation = evaluate(record.hand.cards(), &record.scenario, decision);
        info!(
            %decision,
            correct_action = %record.correct_action,
            correct,
            time_taken_ms,
            "decision judged"
        );

        let saved = self
            .record_session(&round.served, decision, correct, time_taken_ms)
            .await;

        let coach_notes = if self.config.coach_notes {
            self.pipeline
                .bounded(
                    "analyze_hand",
                    self.pipeline
                        .coach()
                        .analyze_hand(&record.hand, &record.scenario, decision),
                )
                .await
        } else {
            None
        };

        let entry = GameEntry {
            id: Uuid::new_v4(),
            hand: record.hand,
            scenario: record.scenario.clone(),
            decision,
            correct,
            timestamp: SystemTime::now(),
            difficulty: record.difficulty,
            focus_area: self.progress.current_focus.clone(),
        };
        let outcome = self.progress.record(entry);
        if outcome.analysis_due {
            self.spawn_analysis();
        }
        self.spawn_progress_save();

        Ok(DecisionOutcome {
            decision,
            correct,
            correct_action: record.correct_action,
            explanation,
            rationale: record.explanation.clone(),
            evaluation,
            time_taken_ms,
            source: round.served.source,
            saved,
            coach_notes,
            streak: self.progress.streak,
            analysis_requested: outcome.analysis_due,
        })
    }

    /// Saves the session row; on success the scenario's stats update runs in
    /// the background. Any failure means "judged but not saved".
    async fn record_session(
        &self,
        served: &ServedScenario,
        decision: Decision,
        correct: bool,
        time_taken_ms: u64,
    ) -> bool {
        let Some(scenario_id) = served.scenario.id.clone().filter(|_| served.has_id()) else {
            debug!("scenario has no id; decision not saved");
            return false;
        };

        let record = SessionRecord {
            user_id: self.user_id.clone(),
            scenario_id: scenario_id.clone(),
            decision,
            correct,
            time_taken_ms,
            created_at: SystemTime::now(),
        };
        let store = Arc::clone(self.pipeline.store());
        // Awaited: `saved` in the outcome reports this write.
        if self
            .pipeline
            .bounded("save_game_session", store.save_game_session(record))
            .await
            .is_none()
        {
            return false;
        }

        self.pipeline.background().spawn("update_scenario_stats", async move {
            store.update_scenario_stats(&scenario_id, correct).await
        });
        true
    }

    fn spawn_analysis(&self) {
        let coach = Arc::clone(self.pipeline.coach());
        let history = self.progress.recent(ANALYSIS_WINDOW);
        let level = self.progress.level;
        let insight = Arc::clone(&self.insight);
        let timeout = self.pipeline.config().collaborator_timeout;
        info!(total_games = self.progress.total_games, "requesting progress analysis");
        self.pipeline.background().spawn("analyze_progress", async move {
            let analysis = coach.analyze_progress(&history, level);
            let text = match tokio::time::timeout(timeout, analysis).await {
                Ok(Ok(text)) => text,
                Ok(Err(err)) => {
                    warn!(error = %err, "progress analysis failed; using offline note");
                    FALLBACK_ANALYSIS.to_string()
                }
                Err(_) => {
                    warn!("progress analysis timed out; using offline note");
                    FALLBACK_ANALYSIS.to_string()
                }
            };
            *insight.lock() = Some(text);
            Ok::<(), std::convert::Infallible>(())
        });
    }

    /// Saves run one at a time per session; a snapshot older than the last
    /// one written is dropped.
    fn spawn_progress_save(&mut self) {
        if self.offline {
            return;
        }
        self.progress_version += 1;
        let version = self.progress_version;
        let written = Arc::clone(&self.progress_written);
        let store = Arc::clone(self.pipeline.store());
        let user_id = self.user_id.clone();
        let progress = self.progress.clone();
        self.pipeline.background().spawn("save_player_progress", async move {
            let mut last = written.lock().await;
            if *last >= version {
                debug!(version, last = *last, "newer progress already saved");
                return Ok(());
            }
            let saved = store.save_player_progress(&user_id, progress).await;
            if saved.is_ok() {
                *last = version;
            }
            saved
        });
    }

    /// A coach question about the current spot, or the offline question.
    pub async fn coach_question(&self) -> String {
        let Some(round) = &self.current else {
            return FALLBACK_QUESTION.to_string();
        };
        let history = self.progress.recent(5);
        self.pipeline
            .bounded(
                "generate_question",
                self.pipeline.coach().generate_question(
                    &round.served.scenario.hand,
                    &round.served.scenario.scenario,
                    &history,
                ),
            )
            .await
            .unwrap_or_else(|| FALLBACK_QUESTION.to_string())
    }

    pub async fn detailed_stats(&self, days: u32) -> DetailedStats {
        let sessions = self
            .pipeline
            .bounded(
                "get_player_stats",
                self.pipeline.store().get_player_stats(&self.user_id, days),
            )
            .await
            .unwrap_or_default();
        summarize_sessions(&sessions, &self.progress, days, SystemTime::now())
    }

    pub async fn diagnostics(&self) -> Diagnostics {
        let store_connected = self
            .pipeline
            .bounded("ping", self.pipeline.store().ping())
            .await
            .is_some();
        Diagnostics {
            session_id: self.id,
            user_id: self.user_id.clone(),
            has_current_scenario: self.current.is_some(),
            current_source: self.current.as_ref().map(|round| round.served.source),
            current_has_id: self
                .current
                .as_ref()
                .is_some_and(|round| round.served.has_id()),
            store_connected,
            pending_background_tasks: self.pipeline.background().pending(),
            cache: self.pipeline.cache().stats().await,
        }
    }

    pub fn snapshot(&self) -> SessionState {
        SessionState {
            session_id: self.id,
            user_id: self.user_id.clone(),
            offline: self.offline,
            progress: ProgressSummary {
                level: self.progress.level,
                current_focus: self.progress.current_focus.clone(),
                total_games: self.progress.total_games,
                correct_decisions: self.progress.correct_decisions,
                streak: self.progress.streak,
                accuracy: self.progress.accuracy(),
            },
            current: self.current_round().cloned(),
            insight: self.latest_insight(),
        }
    }
}
