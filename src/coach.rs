//! Seam for the language-model coach. Every call may fail; callers always
//! have an offline fallback.

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::cards::Hand;
use crate::evaluator::{rationale, recommended_action};
use crate::game::Decision;
use crate::progress::{GameEntry, SkillLevel};
use crate::scenario::{Scenario, pot_accurate_scenario};
use crate::strength::{classify_hand, deal_for_level};

pub const FALLBACK_QUESTION: &str = "Given your position and the action in front of you, how would you play this hand, and which pot-odds and range considerations drive that choice?";
pub const FALLBACK_ANALYSIS: &str =
    "Keep practising pre-flop decisions. Pay attention to position and hand strength.";

/// A coach-synthesized spot before the pipeline attaches ids and counters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioDraft {
    pub hand: Hand,
    pub scenario: Scenario,
    pub correct_action: Decision,
    pub explanation: String,
    pub difficulty: u8,
}

#[derive(Debug, thiserror::Error)]
pub enum CoachError {
    #[error("coach unavailable: {0}")]
    Unavailable(String),
    #[error("coach returned an unusable draft: {0}")]
    MalformedDraft(String),
}

pub trait Coach: Send + Sync {
    fn generate_scenario<'a>(
        &'a self,
        level: SkillLevel,
        focus_area: &'a str,
    ) -> BoxFuture<'a, Result<ScenarioDraft, CoachError>>;

    fn generate_question<'a>(
        &'a self,
        hand: &'a Hand,
        scenario: &'a Scenario,
        history: &'a [GameEntry],
    ) -> BoxFuture<'a, Result<String, CoachError>>;

    fn analyze_progress<'a>(
        &'a self,
        history: &'a [GameEntry],
        level: SkillLevel,
    ) -> BoxFuture<'a, Result<String, CoachError>>;

    fn analyze_hand<'a>(
        &'a self,
        hand: &'a Hand,
        scenario: &'a Scenario,
        decision: Decision,
    ) -> BoxFuture<'a, Result<String, CoachError>>;
}

/// No coach configured: every call fails and the caller falls back.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineCoach;

impl OfflineCoach {
    fn unavailable<'a, T: Send + 'a>() -> BoxFuture<'a, Result<T, CoachError>> {
        futures::future::ready(Err(CoachError::Unavailable("offline".to_string()))).boxed()
    }
}

impl Coach for OfflineCoach {
    fn generate_scenario<'a>(
        &'a self,
        _level: SkillLevel,
        _focus_area: &'a str,
    ) -> BoxFuture<'a, Result<ScenarioDraft, CoachError>> {
        Self::unavailable()
    }

    fn generate_question<'a>(
        &'a self,
        _hand: &'a Hand,
        _scenario: &'a Scenario,
        _history: &'a [GameEntry],
    ) -> BoxFuture<'a, Result<String, CoachError>> {
        Self::unavailable()
    }

    fn analyze_progress<'a>(
        &'a self,
        _history: &'a [GameEntry],
        _level: SkillLevel,
    ) -> BoxFuture<'a, Result<String, CoachError>> {
        Self::unavailable()
    }

    fn analyze_hand<'a>(
        &'a self,
        _hand: &'a Hand,
        _scenario: &'a Scenario,
        _decision: Decision,
    ) -> BoxFuture<'a, Result<String, CoachError>> {
        Self::unavailable()
    }
}

/// Deterministic stand-in for a hosted model. Drafts come from the
/// level-weighted dealer and the pot-accurate generator, labelled with the
/// evaluator's default line.
pub struct MockCoach {
    rng: Mutex<StdRng>,
}

impl MockCoach {
    pub fn new(seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(rand::random);
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn draft(&self, level: SkillLevel) -> ScenarioDraft {
        let mut rng = self.rng.lock();
        let hand = deal_for_level(level, &mut *rng);
        let scenario = pot_accurate_scenario(&mut *rng);
        let tier = classify_hand(&hand);
        let correct_action = recommended_action(tier, &scenario);
        let difficulty = match level {
            SkillLevel::Beginner => rng.gen_range(1..=3),
            SkillLevel::Intermediate => rng.gen_range(4..=6),
            SkillLevel::Advanced => rng.gen_range(7..=9),
        };
        ScenarioDraft {
            explanation: rationale(tier, &scenario, correct_action),
            hand,
            scenario,
            correct_action,
            difficulty,
        }
    }
}

impl Coach for MockCoach {
    fn generate_scenario<'a>(
        &'a self,
        level: SkillLevel,
        _focus_area: &'a str,
    ) -> BoxFuture<'a, Result<ScenarioDraft, CoachError>> {
        futures::future::ready(Ok(self.draft(level))).boxed()
    }

    fn generate_question<'a>(
        &'a self,
        hand: &'a Hand,
        scenario: &'a Scenario,
        _history: &'a [GameEntry],
    ) -> BoxFuture<'a, Result<String, CoachError>> {
        let question = format!(
            "Holding {hand} in the {} facing {:.1}bb into {:.1}bb, what is your plan and why?",
            scenario.position.name(),
            scenario.to_call,
            scenario.pot
        );
        futures::future::ready(Ok(question)).boxed()
    }

    fn analyze_progress<'a>(
        &'a self,
        history: &'a [GameEntry],
        level: SkillLevel,
    ) -> BoxFuture<'a, Result<String, CoachError>> {
        let correct = history.iter().filter(|entry| entry.correct).count();
        let note = format!(
            "{correct}/{} recent decisions correct at {level} level. {FALLBACK_ANALYSIS}",
            history.len()
        );
        futures::future::ready(Ok(note)).boxed()
    }

    fn analyze_hand<'a>(
        &'a self,
        hand: &'a Hand,
        scenario: &'a Scenario,
        decision: Decision,
    ) -> BoxFuture<'a, Result<String, CoachError>> {
        let tier = classify_hand(hand);
        let recommended = recommended_action(tier, scenario);
        let note = if decision.matches(recommended) {
            format!(
                "{decision} with {hand} from the {} is the standard line.",
                scenario.position.name()
            )
        } else {
            format!(
                "{decision} with {hand} from the {} deviates from the standard {recommended}.",
                scenario.position.name()
            )
        };
        futures::future::ready(Ok(note)).boxed()
    }
}
