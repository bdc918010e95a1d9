use std::collections::BTreeMap;

use rand::Rng;
use rand::distributions::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

use crate::game::SeatAction;
use crate::position::Position;

/// Flat action mix for the seats around the hero. Presentation only: it has
/// no bearing on the scenario's pot or on correctness.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TableProfile {
    pub fold_frequency: f32,
    pub call_frequency: f32,
}

impl Default for TableProfile {
    fn default() -> Self {
        Self {
            fold_frequency: 0.6,
            call_frequency: 0.25,
        }
    }
}

impl TableProfile {
    pub fn raise_frequency(&self) -> f32 {
        (1.0 - self.fold_frequency - self.call_frequency).max(0.0)
    }

    pub fn random_action<R: Rng + ?Sized>(&self, rng: &mut R) -> SeatAction {
        let uniform = Uniform::new(0.0f32, 1.0f32);
        let roll = uniform.sample(rng);
        if roll < self.fold_frequency {
            SeatAction::Fold
        } else if roll < self.fold_frequency + self.call_frequency {
            SeatAction::Call
        } else {
            SeatAction::Raise
        }
    }

    /// One action for every seat except the hero's.
    pub fn seat_actions<R: Rng + ?Sized>(
        &self,
        hero: Position,
        rng: &mut R,
    ) -> BTreeMap<Position, SeatAction> {
        Position::ALL
            .into_iter()
            .filter(|seat| *seat != hero)
            .map(|seat| (seat, self.random_action(rng)))
            .collect()
    }
}
