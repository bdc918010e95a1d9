use std::fmt::{Display, Formatter};

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::cards::{Card, Hand, Rank, Suit, deal_hand};
use crate::progress::SkillLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandStrengthTier {
    Weak,
    Medium,
    Strong,
    Premium,
}

impl HandStrengthTier {
    pub const ALL: [HandStrengthTier; 4] = [
        HandStrengthTier::Premium,
        HandStrengthTier::Strong,
        HandStrengthTier::Medium,
        HandStrengthTier::Weak,
    ];

    pub fn label(self) -> &'static str {
        match self {
            HandStrengthTier::Premium => "premium",
            HandStrengthTier::Strong => "strong",
            HandStrengthTier::Medium => "medium",
            HandStrengthTier::Weak => "weak",
        }
    }

    /// Curated hand list for the tier. Keys carry no suited/offsuit suffix.
    pub fn members(self) -> &'static [&'static str] {
        match self {
            HandStrengthTier::Premium => PREMIUM,
            HandStrengthTier::Strong => STRONG,
            HandStrengthTier::Medium => MEDIUM,
            HandStrengthTier::Weak => WEAK_SAMPLES,
        }
    }
}

impl Display for HandStrengthTier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

const PREMIUM: &[&str] = &["AA", "KK", "QQ", "AK"];
const STRONG: &[&str] = &["JJ", "TT", "AQ", "AJ", "KQ"];
const MEDIUM: &[&str] = &["99", "88", "77", "66", "AT", "KJ", "QJ", "A9"];
// Only used for dealing; classification treats every unlisted hand as weak.
const WEAK_SAMPLES: &[&str] = &["55", "44", "33", "22", "K9", "Q9", "J9", "T9"];

const LOOKUP_ORDER: [HandStrengthTier; 3] = [
    HandStrengthTier::Premium,
    HandStrengthTier::Strong,
    HandStrengthTier::Medium,
];

/// Rank-pair key (`"AK"`) and suit-qualified key (`"AKs"`, `"AKo"`), high rank first.
/// Pairs only get the plain key.
pub fn hand_keys(hand: &Hand) -> (String, Option<String>) {
    let (high, low) = hand.high_low();
    let plain = format!("{}{}", high.rank, low.rank);
    if hand.is_pair() {
        return (plain, None);
    }
    let qualifier = if hand.is_suited() { 's' } else { 'o' };
    let qualified = format!("{plain}{qualifier}");
    (plain, Some(qualified))
}

/// Total over any card slice: anything but two distinct cards is weak.
pub fn classify(cards: &[Card]) -> HandStrengthTier {
    match cards {
        [first, second] => Hand::new(*first, *second)
            .map(|hand| classify_hand(&hand))
            .unwrap_or(HandStrengthTier::Weak),
        _ => HandStrengthTier::Weak,
    }
}

pub fn classify_hand(hand: &Hand) -> HandStrengthTier {
    let (plain, qualified) = hand_keys(hand);
    for tier in LOOKUP_ORDER {
        let members = tier.members();
        let hit = members.contains(&plain.as_str())
            || qualified
                .as_deref()
                .is_some_and(|key| members.contains(&key));
        if hit {
            return tier;
        }
    }
    HandStrengthTier::Weak
}

/// Tier mix per level, in `HandStrengthTier::ALL` order.
fn tier_weights(level: SkillLevel) -> [f32; 4] {
    match level {
        SkillLevel::Beginner => [0.3, 0.2, 0.2, 0.3],
        SkillLevel::Intermediate => [0.15, 0.25, 0.4, 0.2],
        SkillLevel::Advanced => [0.1, 0.2, 0.3, 0.4],
    }
}

/// Deals a hand whose tier follows the level's mix.
pub fn deal_for_level<R: Rng + ?Sized>(level: SkillLevel, rng: &mut R) -> Hand {
    let roll: f32 = rng.gen_range(0.0..1.0);
    let mut acc = 0.0;
    let mut target = HandStrengthTier::Weak;
    for (tier, weight) in HandStrengthTier::ALL.into_iter().zip(tier_weights(level)) {
        acc += weight;
        if roll < acc {
            target = tier;
            break;
        }
    }
    deal_from_tier(target, rng)
}

/// Deals a random holding from the tier's curated list with random suits.
pub fn deal_from_tier<R: Rng + ?Sized>(tier: HandStrengthTier, rng: &mut R) -> Hand {
    let label = tier.members().choose(rng).copied().unwrap_or("72");
    let mut chars = label.chars().map(|c| c.to_string());
    let high: Rank = chars
        .next()
        .and_then(|c| c.parse().ok())
        .unwrap_or(Rank::Seven);
    let low: Rank = chars.next().and_then(|c| c.parse().ok()).unwrap_or(Rank::Two);

    let mut suits = Suit::ALL;
    suits.shuffle(rng);
    let second_suit = if high != low && rng.gen_bool(0.25) {
        suits[0]
    } else {
        suits[1]
    };
    let first = Card::new(high, suits[0]);
    let second = Card::new(low, second_suit);
    // Pairs always take two different suits.
    Hand::new(first, second).unwrap_or_else(|_| deal_hand(rng))
}
