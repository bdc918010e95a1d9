//! Pre-flop correctness rules, the default line for each spot, and the offline
//! explanation shown after every decision.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::cards::Card;
use crate::game::Decision;
use crate::scenario::Scenario;
use crate::strength::{HandStrengthTier, classify};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Evaluation {
    pub is_correct: bool,
    pub explanation: String,
    pub hand_strength: HandStrengthTier,
    pub recommended_action: Decision,
}

/// Every action the rules accept for this tier and spot.
pub fn accepted_actions(tier: HandStrengthTier, scenario: &Scenario) -> &'static [Decision] {
    let position = scenario.position;
    let early = position.is_early();
    let late = position.is_late();
    let raised = scenario.is_raised;

    match tier {
        HandStrengthTier::Premium => &[Decision::Raise],
        HandStrengthTier::Strong if raised && early => &[Decision::Call],
        HandStrengthTier::Strong => &[Decision::Raise, Decision::Call],
        HandStrengthTier::Medium if early => &[Decision::Fold],
        HandStrengthTier::Medium if late && !raised => &[Decision::Call, Decision::Raise],
        HandStrengthTier::Medium if raised => &[Decision::Fold],
        HandStrengthTier::Medium => &[Decision::Call],
        HandStrengthTier::Weak if position.is_blind() && !raised => {
            &[Decision::Check, Decision::Call]
        }
        HandStrengthTier::Weak if late && !raised && scenario.num_callers == 0 => {
            &[Decision::Fold, Decision::Call]
        }
        HandStrengthTier::Weak => &[Decision::Fold],
    }
}

pub fn is_decision_correct(
    tier: HandStrengthTier,
    scenario: &Scenario,
    decision: Decision,
) -> bool {
    accepted_actions(tier, scenario)
        .iter()
        .any(|accepted| accepted.matches(decision))
}

/// The single default line. Coarser than the accepted set: weak hands always fold.
pub fn recommended_action(tier: HandStrengthTier, scenario: &Scenario) -> Decision {
    let early = scenario.position.is_early();
    match tier {
        HandStrengthTier::Premium => Decision::Raise,
        HandStrengthTier::Strong if scenario.is_raised && early => Decision::Call,
        HandStrengthTier::Strong => Decision::Raise,
        HandStrengthTier::Medium if early || scenario.is_raised => Decision::Fold,
        HandStrengthTier::Medium => Decision::Call,
        HandStrengthTier::Weak => Decision::Fold,
    }
}

pub fn explain(
    tier: HandStrengthTier,
    scenario: &Scenario,
    decision: Decision,
    is_correct: bool,
) -> String {
    let mut text = opening(tier, scenario);
    if is_correct {
        text.push_str("Correct decision! ");
        text.push_str(tier_note(tier));
        return text;
    }

    let recommended = recommended_action(tier, scenario);
    text.push_str("Not the best decision. ");
    text.push_str(mistake_note(tier, decision));
    let accepted = accepted_actions(tier, scenario)
        .iter()
        .map(|action| action.display_label(scenario.to_call))
        .dedup()
        .join(" or ");
    text.push_str(&format!(
        "Recommended: {}. Accepted here: {}.",
        recommended.display_label(scenario.to_call),
        accepted
    ));
    text
}

/// Explanation for a spot whose answer was fixed when the scenario was
/// generated. The verdict follows `answer`, not the rule table.
pub fn explain_against(
    tier: HandStrengthTier,
    scenario: &Scenario,
    decision: Decision,
    answer: Decision,
) -> String {
    if decision.matches(answer) {
        return explain(tier, scenario, decision, true);
    }
    let mut text = opening(tier, scenario);
    text.push_str("Not the best decision. ");
    text.push_str(mistake_note(tier, decision));
    text.push_str(&format!(
        "The answer for this spot is {}.",
        answer.display_label(scenario.to_call)
    ));
    text
}

/// Verdict-free note stored with a generated scenario.
pub fn rationale(tier: HandStrengthTier, scenario: &Scenario, action: Decision) -> String {
    format!(
        "{}{} Best play: {}.",
        opening(tier, scenario),
        tier_note(tier),
        action.display_label(scenario.to_call)
    )
}

fn opening(tier: HandStrengthTier, scenario: &Scenario) -> String {
    format!(
        "{} hand from the {}. ",
        capitalize(tier.label()),
        scenario.position.name()
    )
}

fn tier_note(tier: HandStrengthTier) -> &'static str {
    match tier {
        HandStrengthTier::Premium => {
            "With a premium hand like this, raising to build the pot is almost always best."
        }
        HandStrengthTier::Strong => "A strong hand that justifies aggressive play in most spots.",
        HandStrengthTier::Medium => {
            "A medium hand that depends on position and the action in front of you."
        }
        HandStrengthTier::Weak => "A weak hand that is usually not worth playing.",
    }
}

fn mistake_note(tier: HandStrengthTier, decision: Decision) -> &'static str {
    match tier {
        HandStrengthTier::Premium if decision.normalized() != Decision::Raise => {
            "With a premium hand, raising is the strongest play. "
        }
        HandStrengthTier::Weak if decision.normalized() != Decision::Fold => {
            "A weak hand like this is not worth the investment here. "
        }
        _ => "",
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Classifies the cards, applies the rules, and renders the explanation.
pub fn evaluate(cards: &[Card], scenario: &Scenario, decision: Decision) -> Evaluation {
    let hand_strength = classify(cards);
    let is_correct = is_decision_correct(hand_strength, scenario, decision);
    Evaluation {
        is_correct,
        explanation: explain(hand_strength, scenario, decision, is_correct),
        hand_strength,
        recommended_action: recommended_action(hand_strength, scenario),
    }
}
