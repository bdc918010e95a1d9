use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::game::{Phase, SeatAction};
use crate::position::{BIG_BLIND_BB, Position, SMALL_BLIND_BB};

pub const STARTING_POT_BB: f32 = SMALL_BLIND_BB + BIG_BLIND_BB;
const MIN_RAISE_MULTIPLE: f32 = 2.0;
const MAX_RAISE_MULTIPLE: f32 = 4.0;
const RAISE_MULTIPLES: [f32; 5] = [2.0, 2.5, 3.0, 3.5, 4.0];
const TABLE_SIZE: u8 = 6;

/// One pre-flop decision point. Amounts are in big blinds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    pub position: Position,
    pub pot: f32,
    pub to_call: f32,
    pub is_raised: bool,
    pub num_callers: u8,
    pub players_in_hand: u8,
    #[serde(default)]
    pub actions_before: Vec<SeatAction>,
    #[serde(default)]
    pub phase: Phase,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScenarioError {
    #[error("pot {0:.1}bb is below the posted blinds")]
    PotBelowBlinds(f32),
    #[error("raise of {0:.1}bb is outside 2-4bb")]
    RaiseOutOfRange(f32),
    #[error("{callers} callers declared but {traced} calls traced")]
    CallerMismatch { callers: u8, traced: usize },
    #[error("negative amount to call")]
    NegativeCall,
}

impl Scenario {
    pub fn check_invariants(&self) -> Result<(), ScenarioError> {
        if self.pot + f32::EPSILON < STARTING_POT_BB {
            return Err(ScenarioError::PotBelowBlinds(self.pot));
        }
        if self.to_call < 0.0 {
            return Err(ScenarioError::NegativeCall);
        }
        if self.is_raised && !(MIN_RAISE_MULTIPLE..=MAX_RAISE_MULTIPLE).contains(&self.to_call) {
            return Err(ScenarioError::RaiseOutOfRange(self.to_call));
        }
        let traced = self
            .actions_before
            .iter()
            .filter(|action| **action == SeatAction::Call)
            .count();
        if traced != usize::from(self.num_callers) {
            return Err(ScenarioError::CallerMismatch {
                callers: self.num_callers,
                traced,
            });
        }
        Ok(())
    }

    pub fn summary(&self) -> String {
        let action = if self.is_raised {
            format!("raised to {:.1}bb", self.to_call)
        } else {
            "unraised".to_string()
        };
        format!(
            "{} | pot {:.1}bb | {} | {} caller(s) | {} in hand",
            self.position, self.pot, action, self.num_callers, self.players_in_hand
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorKind {
    /// Coarse random spot: fixed 2bb raise, up to two callers.
    #[default]
    Uniform,
    /// Explicit blind posting, 2-4bb raise sizes, at most one caller.
    PotAccurate,
}

impl GeneratorKind {
    pub fn generate<R: Rng + ?Sized>(self, rng: &mut R) -> Scenario {
        match self {
            GeneratorKind::Uniform => uniform_scenario(rng),
            GeneratorKind::PotAccurate => pot_accurate_scenario(rng),
        }
    }
}

fn random_position<R: Rng + ?Sized>(rng: &mut R) -> Position {
    *Position::ALL.choose(rng).unwrap_or(&Position::Btn)
}

fn round_tenth(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

/// Pot is blinds, plus the raise when there is one, plus every caller's call.
pub fn uniform_scenario<R: Rng + ?Sized>(rng: &mut R) -> Scenario {
    let position = random_position(rng);
    let is_raised = rng.gen_bool(0.4);
    let num_callers: u8 = rng.gen_range(0..=2);
    let players_in_hand = TABLE_SIZE - rng.gen_range(0..=2);

    let mut pot = STARTING_POT_BB;
    let mut to_call = BIG_BLIND_BB;
    let mut actions_before = Vec::new();
    if is_raised {
        let raise = to_call * MIN_RAISE_MULTIPLE;
        pot += raise;
        to_call = raise;
        actions_before.push(SeatAction::Raise);
    }
    pot += f32::from(num_callers) * to_call;
    actions_before.extend(std::iter::repeat_n(SeatAction::Call, usize::from(num_callers)));

    Scenario {
        position,
        pot: round_tenth(pot),
        to_call,
        is_raised,
        num_callers,
        players_in_hand,
        actions_before,
        phase: Phase::PreFlop,
    }
}

/// Posts the blinds, optionally opens for 2-4bb, then lets at most one seat call
/// the current bet. The trace records those actions in order.
pub fn pot_accurate_scenario<R: Rng + ?Sized>(rng: &mut R) -> Scenario {
    let position = random_position(rng);
    let mut pot = STARTING_POT_BB;
    let mut current_bet = BIG_BLIND_BB;
    let mut actions_before = Vec::new();

    let is_raised = rng.gen_bool(0.5);
    if is_raised {
        let multiple = *RAISE_MULTIPLES.choose(rng).unwrap_or(&MIN_RAISE_MULTIPLE);
        current_bet = BIG_BLIND_BB * multiple;
        pot += current_bet;
        actions_before.push(SeatAction::Raise);
    }

    let num_callers: u8 = rng.gen_range(0..=1);
    for _ in 0..num_callers {
        pot += current_bet;
        actions_before.push(SeatAction::Call);
    }

    let blinds_in_hand: u8 = if position.is_blind() { 1 } else { 2 };
    let players_in_hand = (1 + blinds_in_hand + u8::from(is_raised) + num_callers).min(TABLE_SIZE);

    Scenario {
        position,
        pot: round_tenth(pot),
        to_call: current_bet,
        is_raised,
        num_callers,
        players_in_hand,
        actions_before,
        phase: Phase::PreFlop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invariant_check_rejects_bad_traces() {
        let scenario = Scenario {
            position: Position::Co,
            pot: 3.5,
            to_call: 2.0,
            is_raised: true,
            num_callers: 1,
            players_in_hand: 4,
            actions_before: vec![SeatAction::Raise],
            phase: Phase::PreFlop,
        };
        assert_eq!(
            scenario.check_invariants(),
            Err(ScenarioError::CallerMismatch {
                callers: 1,
                traced: 0
            })
        );
    }
}
