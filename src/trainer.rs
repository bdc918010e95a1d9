use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use itertools::Itertools;
use owo_colors::OwoColorize;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::ScenarioCache;
use crate::coach::{Coach, MockCoach, OfflineCoach};
use crate::evaluator::recommended_action;
use crate::game::Decision;
use crate::kv::{FileKv, KeyValueStore, MemoryKv};
use crate::pipeline::{PipelineConfig, ScenarioPipeline};
use crate::progress::{DEFAULT_FOCUS, SkillLevel};
use crate::session::{DecisionOutcome, RoundView, SessionConfig, TrainingSession};
use crate::store::{MemoryScenarioStore, ScenarioSource, ScenarioStore};
use crate::strength::classify_hand;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    pub rounds: u32,
    pub seed: Option<u64>,
    #[serde(default)]
    pub level: SkillLevel,
    #[serde(default = "default_focus")]
    pub focus: String,
    #[serde(default)]
    pub no_color: bool,
    /// Use the built-in deterministic coach instead of running without one.
    #[serde(default)]
    pub mock_ai: bool,
    /// Persist cache pools as files here; in memory when unset.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    #[serde(default = "default_user")]
    pub user_id: String,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

fn default_focus() -> String {
    DEFAULT_FOCUS.to_string()
}

fn default_user() -> String {
    "local-player".to_string()
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            rounds: 1,
            seed: None,
            level: SkillLevel::default(),
            focus: default_focus(),
            no_color: false,
            mock_ai: false,
            cache_dir: None,
            user_id: default_user(),
            pipeline: PipelineConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TrainerSummary {
    pub rounds_played: u32,
    pub correct: u32,
    pub saved: u32,
    pub from_cache: u32,
    pub from_database: u32,
    pub generated: u32,
    pub fallback: u32,
    pub best_streak: u32,
}

impl TrainerSummary {
    fn record(&mut self, outcome: &DecisionOutcome) {
        self.rounds_played += 1;
        if outcome.correct {
            self.correct += 1;
        }
        if outcome.saved {
            self.saved += 1;
        }
        match outcome.source {
            ScenarioSource::Cache => self.from_cache += 1,
            ScenarioSource::Database => self.from_database += 1,
            ScenarioSource::AiGenerated => self.generated += 1,
            ScenarioSource::Fallback => self.fallback += 1,
        }
        self.best_streak = self.best_streak.max(outcome.streak);
    }

    pub fn accuracy(&self) -> f32 {
        if self.rounds_played == 0 {
            0.0
        } else {
            self.correct as f32 / self.rounds_played as f32 * 100.0
        }
    }
}

/// Wires a pipeline from local parts: file or memory cache, in-memory store,
/// and either the mock coach or none.
pub async fn build_pipeline(config: &TrainerConfig) -> Result<ScenarioPipeline> {
    let kv: Arc<dyn KeyValueStore> = match &config.cache_dir {
        Some(dir) => Arc::new(FileKv::open(dir).await?),
        None => Arc::new(MemoryKv::new()),
    };
    let coach: Arc<dyn Coach> = if config.mock_ai {
        Arc::new(MockCoach::new(config.seed))
    } else {
        Arc::new(OfflineCoach)
    };
    let store: Arc<dyn ScenarioStore> = Arc::new(MemoryScenarioStore::new());
    let mut pipeline_config = config.pipeline.clone();
    if pipeline_config.seed.is_none() {
        pipeline_config.seed = config.seed;
    }
    let cache = Arc::new(ScenarioCache::new(kv, pipeline_config.cache.clone()));
    Ok(ScenarioPipeline::new(cache, store, coach, pipeline_config))
}

pub struct Trainer {
    config: TrainerConfig,
    session: TrainingSession,
}

impl Trainer {
    pub async fn new(config: TrainerConfig) -> Result<Self> {
        let pipeline = build_pipeline(&config).await?;
        let session_config = SessionConfig {
            coach_notes: config.mock_ai,
            seed: config.seed,
            ..SessionConfig::default()
        };
        let mut session =
            TrainingSession::start(config.user_id.clone(), pipeline, session_config).await;
        session.set_training(config.level, config.focus.clone());
        Ok(Self { config, session })
    }

    pub fn session(&self) -> &TrainingSession {
        &self.session
    }

    pub async fn run(&mut self) -> Result<TrainerSummary> {
        let mut summary = TrainerSummary::default();
        let mut input = String::new();

        for _ in 0..self.config.rounds {
            let round = self.session.next_round().await?;
            self.print_round(&round);

            let decision = loop {
                input.clear();
                print!("Decision [f/c/r] (h=help, q=quit): ");
                io::stdout().flush()?;
                if io::stdin().read_line(&mut input)? == 0 {
                    return self.finish(summary).await;
                }
                let trimmed = input.trim().to_lowercase();
                match trimmed.as_str() {
                    "q" => return self.finish(summary).await,
                    "h" => {
                        self.print_help(&round);
                        continue;
                    }
                    "?" => {
                        println!("{}", self.session.coach_question().await);
                        continue;
                    }
                    _ => {}
                }
                match trimmed.parse::<Decision>() {
                    Ok(decision) => break decision,
                    Err(_) => println!("Invalid selection. Try again or press 'h' for help."),
                }
            };

            let outcome = self.session.decide(decision).await?;
            self.print_outcome(&outcome);
            summary.record(&outcome);
        }

        self.finish(summary).await
    }

    /// Plays every round with the evaluator's default line.
    pub async fn autoplay_recommended(&mut self) -> Result<TrainerSummary> {
        let mut summary = TrainerSummary::default();
        for _ in 0..self.config.rounds {
            let round = self.session.next_round().await?;
            let decision = recommended_action(classify_hand(&round.hand), &round.scenario);
            let outcome = self.session.decide(decision).await?;
            summary.record(&outcome);
        }
        self.session.pipeline().background().flush().await;
        info!(rounds = summary.rounds_played, correct = summary.correct, "autoplay finished");
        Ok(summary)
    }

    async fn finish(&self, summary: TrainerSummary) -> Result<TrainerSummary> {
        self.session.pipeline().background().flush().await;
        if let Some(insight) = self.session.latest_insight() {
            println!("Coach: {insight}");
        }
        self.print_summary(&summary);
        Ok(summary)
    }

    fn print_round(&self, round: &RoundView) {
        let spot = &round.scenario;
        let table = round
            .table
            .iter()
            .map(|(seat, action)| format!("{seat}:{action}"))
            .join(" ");
        let options = round.choices.iter().dedup().join("/");

        if self.config.no_color {
            println!(
                "Round {} | {} | Hand {} | Pot {:.1}bb | To call {:.1}bb | Table {} | Options {}",
                round.round,
                spot.position.name(),
                round.hand,
                spot.pot,
                spot.to_call,
                table,
                options
            );
        } else {
            println!(
                "{} {} {} {} {} {:.1}bb {} {:.1}bb {} {} {}",
                "Round".bold().cyan(),
                round.round,
                spot.position.name().bold().white(),
                round.hand.to_string().bold().yellow(),
                "Pot".bold().white(),
                spot.pot,
                "To call".bold().white(),
                spot.to_call,
                table.dimmed(),
                "Options".bold().yellow(),
                options.bold().green()
            );
        }
    }

    fn print_outcome(&self, outcome: &DecisionOutcome) {
        if self.config.no_color {
            println!("{}", plain_outcome(outcome));
        } else if outcome.correct {
            println!("{} {}", "Correct".bold().green(), outcome.explanation);
        } else {
            println!(
                "{} you chose {}, answer {}. {}",
                "Incorrect".bold().red(),
                outcome.decision,
                outcome.correct_action.bold().white(),
                outcome.explanation
            );
        }
        if let Some(notes) = &outcome.coach_notes {
            println!("  {notes}");
        }
    }

    pub fn print_summary(&self, summary: &TrainerSummary) {
        if self.config.no_color {
            println!(
                "Summary: rounds={}, correct={}, accuracy={:.1}%, best streak={}",
                summary.rounds_played,
                summary.correct,
                summary.accuracy(),
                summary.best_streak
            );
        } else {
            println!(
                "{} {} {} {} {:.1}% {} {}",
                "Summary".bold().magenta(),
                summary.rounds_played,
                "Correct".bold().white(),
                summary.correct,
                summary.accuracy(),
                "Best streak".bold().white(),
                summary.best_streak
            );
        }
    }

    fn print_help(&self, round: &RoundView) {
        println!("Round {}: {}", round.round, round.scenario.summary());
        println!("  f = fold, c = call (or check when nothing to call), r = raise");
        println!("  ? = ask the coach about this spot, q = quit");
    }
}

/// Uncoloured outcome line; the verdict and the text always agree.
pub fn plain_outcome(outcome: &DecisionOutcome) -> String {
    let verdict = if outcome.correct { "Correct" } else { "Incorrect" };
    format!(
        "{verdict}: you chose {}, answer {}. {}",
        outcome.decision, outcome.correct_action, outcome.explanation
    )
}
