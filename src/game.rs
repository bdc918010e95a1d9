use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    #[default]
    PreFlop,
}

/// The player's answer to a scenario.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Fold,
    Check,
    Call,
    Raise,
}

impl Decision {
    pub const CHOICES: [Decision; 3] = [Decision::Fold, Decision::Call, Decision::Raise];

    /// `Check` is calling a zero-sized bet.
    pub fn normalized(self) -> Decision {
        match self {
            Decision::Check => Decision::Call,
            other => other,
        }
    }

    pub fn matches(self, other: Decision) -> bool {
        self.normalized() == other.normalized()
    }

    pub fn label(self) -> &'static str {
        match self {
            Decision::Fold => "FOLD",
            Decision::Check => "CHECK",
            Decision::Call => "CALL",
            Decision::Raise => "RAISE",
        }
    }

    /// Label as shown to the player facing `to_call`.
    pub fn display_label(self, to_call: f32) -> &'static str {
        match self.normalized() {
            Decision::Call if to_call <= 0.0 => "CHECK",
            other => other.label(),
        }
    }
}

impl Display for Decision {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "F" | "FOLD" => Ok(Decision::Fold),
            "K" | "X" | "CHECK" => Ok(Decision::Check),
            "C" | "CALL" => Ok(Decision::Call),
            "R" | "RAISE" => Ok(Decision::Raise),
            _ => Err(format!("Invalid decision '{s}'")),
        }
    }
}

/// What an opponent did before the hero acted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum SeatAction {
    Fold,
    Call,
    Raise,
}

impl Display for SeatAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SeatAction::Fold => "FOLD",
            SeatAction::Call => "CALL",
            SeatAction::Raise => "RAISE",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_is_an_alias_for_call() {
        assert!(Decision::Check.matches(Decision::Call));
        assert!(!Decision::Check.matches(Decision::Fold));
        assert_eq!(Decision::Call.display_label(0.0), "CHECK");
        assert_eq!(Decision::Call.display_label(2.0), "CALL");
        assert_eq!("x".parse::<Decision>(), Ok(Decision::Check));
    }

    #[test]
    fn decisions_serialize_uppercase() {
        let json = serde_json::to_string(&Decision::Raise).unwrap();
        assert_eq!(json, r#""RAISE""#);
    }
}
