use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CardError {
    #[error("invalid rank '{0}'")]
    InvalidRank(String),
    #[error("invalid suit '{0}'")]
    InvalidSuit(String),
    #[error("invalid card '{0}'")]
    InvalidCard(String),
    #[error("hand cannot hold {0} twice")]
    DuplicateCard(Card),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Suit {
    Clubs,
    Diamonds,
    Hearts,
    Spades,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Spades, Suit::Hearts, Suit::Diamonds, Suit::Clubs];

    pub fn symbol(self) -> &'static str {
        match self {
            Suit::Clubs => "♣",
            Suit::Diamonds => "♦",
            Suit::Hearts => "♥",
            Suit::Spades => "♠",
        }
    }
}

impl Display for Suit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Suit {
    type Err = CardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "c" | "♣" => Ok(Suit::Clubs),
            "d" | "♦" => Ok(Suit::Diamonds),
            "h" | "♥" => Ok(Suit::Hearts),
            "s" | "♠" => Ok(Suit::Spades),
            _ => Err(CardError::InvalidSuit(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[repr(u8)]
pub enum Rank {
    Two = 2,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
    Ace,
}

impl Rank {
    /// Highest first, the order ranks are listed on the training table.
    pub const ALL: [Rank; 13] = [
        Rank::Ace,
        Rank::King,
        Rank::Queen,
        Rank::Jack,
        Rank::Ten,
        Rank::Nine,
        Rank::Eight,
        Rank::Seven,
        Rank::Six,
        Rank::Five,
        Rank::Four,
        Rank::Three,
        Rank::Two,
    ];

    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn short_label(self) -> &'static str {
        match self {
            Rank::Two => "2",
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "T",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
            Rank::Ace => "A",
        }
    }
}

impl Display for Rank {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.short_label())
    }
}

impl FromStr for Rank {
    type Err = CardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "2" => Ok(Rank::Two),
            "3" => Ok(Rank::Three),
            "4" => Ok(Rank::Four),
            "5" => Ok(Rank::Five),
            "6" => Ok(Rank::Six),
            "7" => Ok(Rank::Seven),
            "8" => Ok(Rank::Eight),
            "9" => Ok(Rank::Nine),
            "T" | "10" => Ok(Rank::Ten),
            "J" => Ok(Rank::Jack),
            "Q" => Ok(Rank::Queen),
            "K" => Ok(Rank::King),
            "A" => Ok(Rank::Ace),
            _ => Err(CardError::InvalidRank(s.to_string())),
        }
    }
}

/// Serialized as its notation, e.g. `"A♠"`; parsing also accepts `"As"` and `"10h"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, SerializeDisplay, DeserializeFromStr)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }

    pub fn rank_value(&self) -> u8 {
        self.rank.value()
    }

    pub fn notation(&self) -> String {
        format!("{}{}", self.rank.short_label(), self.suit.symbol())
    }
}

impl Display for Card {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.notation())
    }
}

impl FromStr for Card {
    type Err = CardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let split = trimmed
            .char_indices()
            .last()
            .map(|(idx, _)| idx)
            .filter(|idx| *idx > 0)
            .ok_or_else(|| CardError::InvalidCard(s.to_string()))?;
        let (rank, suit) = trimmed.split_at(split);
        Ok(Card::new(rank.parse()?, suit.parse()?))
    }
}

/// Two distinct hole cards. Order is irrelevant for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[Card; 2]", into = "[Card; 2]")]
pub struct Hand {
    cards: [Card; 2],
}

impl Hand {
    pub fn new(first: Card, second: Card) -> Result<Self, CardError> {
        if first == second {
            return Err(CardError::DuplicateCard(first));
        }
        Ok(Self {
            cards: [first, second],
        })
    }

    pub fn cards(&self) -> &[Card; 2] {
        &self.cards
    }

    pub fn is_pair(&self) -> bool {
        self.cards[0].rank == self.cards[1].rank
    }

    pub fn is_suited(&self) -> bool {
        self.cards[0].suit == self.cards[1].suit
    }

    /// The higher card first; equal ranks keep dealing order.
    pub fn high_low(&self) -> (Card, Card) {
        let [a, b] = self.cards;
        if b.rank > a.rank { (b, a) } else { (a, b) }
    }
}

impl TryFrom<[Card; 2]> for Hand {
    type Error = CardError;

    fn try_from(cards: [Card; 2]) -> Result<Self, Self::Error> {
        Hand::new(cards[0], cards[1])
    }
}

impl From<Hand> for [Card; 2] {
    fn from(hand: Hand) -> Self {
        hand.cards
    }
}

impl Display for Hand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.cards[0], self.cards[1])
    }
}

impl FromStr for Hand {
    type Err = CardError;

    /// Accepts `"A♠ K♥"`, `"As Kh"` or `"AsKh"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        match parts.as_slice() {
            [first, second] => Hand::new(first.parse()?, second.parse()?),
            [joined] if joined.chars().count() == 4 => {
                let split = joined
                    .char_indices()
                    .nth(2)
                    .map(|(idx, _)| idx)
                    .ok_or_else(|| CardError::InvalidCard(s.to_string()))?;
                let (first, second) = joined.split_at(split);
                Hand::new(first.parse()?, second.parse()?)
            }
            _ => Err(CardError::InvalidCard(s.to_string())),
        }
    }
}

pub fn standard_deck() -> Vec<Card> {
    let mut cards = Vec::with_capacity(52);
    for suit in Suit::ALL {
        for rank in Rank::ALL {
            cards.push(Card::new(rank, suit));
        }
    }
    cards
}

pub fn deal_hand<R: Rng + ?Sized>(rng: &mut R) -> Hand {
    let mut deck = standard_deck();
    deck.shuffle(rng);
    Hand {
        cards: [deck[0], deck[1]],
    }
}
