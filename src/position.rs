use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const SMALL_BLIND_BB: f32 = 0.5;
pub const BIG_BLIND_BB: f32 = 1.0;

/// Six-handed seats, listed clockwise from the button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Position {
    Btn,
    Sb,
    Bb,
    Utg,
    Mp,
    Co,
}

/// Coarse grouping used by the correctness rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionCategory {
    Early,
    Middle,
    Late,
    Blind,
}

impl Position {
    pub const ALL: [Position; 6] = [
        Position::Btn,
        Position::Sb,
        Position::Bb,
        Position::Utg,
        Position::Mp,
        Position::Co,
    ];

    /// Pre-flop acting order; the blinds have already posted.
    pub const PREFLOP_ORDER: [Position; 6] = [
        Position::Utg,
        Position::Mp,
        Position::Co,
        Position::Btn,
        Position::Sb,
        Position::Bb,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Position::Btn => "BTN",
            Position::Sb => "SB",
            Position::Bb => "BB",
            Position::Utg => "UTG",
            Position::Mp => "MP",
            Position::Co => "CO",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Position::Btn => "Button",
            Position::Sb => "Small Blind",
            Position::Bb => "Big Blind",
            Position::Utg => "Under the Gun",
            Position::Mp => "Middle Position",
            Position::Co => "Cut-Off",
        }
    }

    pub fn is_dealer(self) -> bool {
        self == Position::Btn
    }

    pub fn is_blind(self) -> bool {
        matches!(self, Position::Sb | Position::Bb)
    }

    pub fn is_early(self) -> bool {
        self == Position::Utg
    }

    pub fn is_late(self) -> bool {
        matches!(self, Position::Co | Position::Btn)
    }

    /// Forced bet posted from this seat, in big blinds.
    pub fn blind_amount(self) -> Option<f32> {
        match self {
            Position::Sb => Some(SMALL_BLIND_BB),
            Position::Bb => Some(BIG_BLIND_BB),
            _ => None,
        }
    }

    pub fn category(self) -> PositionCategory {
        if self.is_early() {
            PositionCategory::Early
        } else if self.is_late() {
            PositionCategory::Late
        } else if self.is_blind() {
            PositionCategory::Blind
        } else {
            PositionCategory::Middle
        }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Position::ALL
            .into_iter()
            .find(|pos| pos.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Invalid position '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_follow_table_flags() {
        assert_eq!(Position::Utg.category(), PositionCategory::Early);
        assert_eq!(Position::Mp.category(), PositionCategory::Middle);
        assert_eq!(Position::Co.category(), PositionCategory::Late);
        assert_eq!(Position::Btn.category(), PositionCategory::Late);
        assert_eq!(Position::Sb.category(), PositionCategory::Blind);
        assert_eq!(Position::Bb.blind_amount(), Some(1.0));
        assert!(Position::Btn.is_dealer());
        assert_eq!("co".parse::<Position>(), Ok(Position::Co));
    }
}
