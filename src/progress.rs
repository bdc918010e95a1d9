use std::collections::{BTreeMap, VecDeque};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_with::{TimestampMilliSeconds, serde_as};
use uuid::Uuid;

use crate::cards::Hand;
use crate::game::Decision;
use crate::scenario::Scenario;
use crate::store::SessionRecord;

pub const HISTORY_CAP: usize = 50;
pub const ANALYSIS_INTERVAL: u32 = 10;
pub const ANALYSIS_WINDOW: usize = 8;
pub const DEFAULT_FOCUS: &str = "pre-flop basics";
const TREND_DAYS: usize = 7;
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum SkillLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl SkillLevel {
    pub fn key(self) -> &'static str {
        match self {
            SkillLevel::Beginner => "beginner",
            SkillLevel::Intermediate => "intermediate",
            SkillLevel::Advanced => "advanced",
        }
    }
}

impl Display for SkillLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for SkillLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(SkillLevel::Beginner),
            "intermediate" => Ok(SkillLevel::Intermediate),
            "advanced" => Ok(SkillLevel::Advanced),
            _ => Err(format!("Invalid level '{s}'")),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameEntry {
    pub id: Uuid,
    pub hand: Hand,
    pub scenario: Scenario,
    pub decision: Decision,
    pub correct: bool,
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub timestamp: SystemTime,
    pub difficulty: u8,
    pub focus_area: String,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerProgress {
    pub level: SkillLevel,
    pub current_focus: String,
    pub total_games: u32,
    pub correct_decisions: u32,
    pub streak: u32,
    #[serde(default)]
    pub game_history: VecDeque<GameEntry>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde_as(as = "Option<TimestampMilliSeconds<i64>>")]
    #[serde(default)]
    pub last_active: Option<SystemTime>,
}

impl Default for PlayerProgress {
    fn default() -> Self {
        Self {
            level: SkillLevel::Beginner,
            current_focus: DEFAULT_FOCUS.to_string(),
            total_games: 0,
            correct_decisions: 0,
            streak: 0,
            game_history: VecDeque::new(),
            strengths: Vec::new(),
            weaknesses: Vec::new(),
            last_active: None,
        }
    }
}

/// What the caller should do after an entry is folded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOutcome {
    pub analysis_due: bool,
}

impl PlayerProgress {
    /// Appends the entry, evicting the oldest past the cap, and updates counters.
    /// Analysis is due on every tenth game.
    pub fn record(&mut self, entry: GameEntry) -> RecordOutcome {
        let correct = entry.correct;
        self.last_active = Some(entry.timestamp);
        self.game_history.push_back(entry);
        while self.game_history.len() > HISTORY_CAP {
            self.game_history.pop_front();
        }

        self.total_games += 1;
        if correct {
            self.correct_decisions += 1;
            self.streak += 1;
        } else {
            self.streak = 0;
        }

        RecordOutcome {
            analysis_due: self.total_games % ANALYSIS_INTERVAL == 0,
        }
    }

    pub fn accuracy(&self) -> f32 {
        if self.total_games == 0 {
            0.0
        } else {
            self.correct_decisions as f32 / self.total_games as f32
        }
    }

    /// Most recent entries, oldest first.
    pub fn recent(&self, count: usize) -> Vec<GameEntry> {
        let skip = self.game_history.len().saturating_sub(count);
        self.game_history.iter().skip(skip).cloned().collect()
    }
}

/// Value-style wrapper around [`PlayerProgress::record`].
pub fn record_outcome(
    mut progress: PlayerProgress,
    entry: GameEntry,
) -> (PlayerProgress, RecordOutcome) {
    let outcome = progress.record(entry);
    (progress, outcome)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatsOverview {
    pub total_games: usize,
    pub correct_decisions: usize,
    /// Rounded percent.
    pub accuracy: u32,
    pub average_time_ms: u64,
    pub current_level: SkillLevel,
    pub current_focus: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyTrend {
    /// Days since the Unix epoch (UTC).
    pub day: u64,
    pub games: u32,
    pub correct: u32,
    pub accuracy: u32,
    pub avg_time_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetailedStats {
    pub overview: StatsOverview,
    pub trends: Vec<DailyTrend>,
    pub recent_sessions: Vec<SessionRecord>,
}

pub fn day_index(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() / DAY.as_secs())
        .unwrap_or(0)
}

/// Aggregates stored sessions (newest first) over a window of `days` ending at `now`.
pub fn summarize_sessions(
    sessions: &[SessionRecord],
    progress: &PlayerProgress,
    days: u32,
    now: SystemTime,
) -> DetailedStats {
    let total_games = sessions.len();
    let correct_decisions = sessions.iter().filter(|s| s.correct).count();
    let total_time: u64 = sessions.iter().map(|s| s.time_taken_ms).sum();
    let accuracy = percent(correct_decisions as u64, total_games as u64);
    let average_time_ms = if total_games > 0 {
        (total_time as f64 / total_games as f64).round() as u64
    } else {
        0
    };

    let today = day_index(now);
    let mut daily: BTreeMap<u64, (u32, u32, u64)> = (0..u64::from(days))
        .filter_map(|offset| today.checked_sub(offset))
        .map(|day| (day, (0, 0, 0)))
        .collect();
    for session in sessions {
        if let Some((games, correct, time)) = daily.get_mut(&day_index(session.created_at)) {
            *games += 1;
            if session.correct {
                *correct += 1;
            }
            *time += session.time_taken_ms;
        }
    }

    let trends: Vec<DailyTrend> = daily
        .into_iter()
        .map(|(day, (games, correct, time))| DailyTrend {
            day,
            games,
            correct,
            accuracy: percent(u64::from(correct), u64::from(games)),
            avg_time_ms: if games > 0 {
                (time as f64 / f64::from(games)).round() as u64
            } else {
                0
            },
        })
        .collect();
    let skip = trends.len().saturating_sub(TREND_DAYS);

    DetailedStats {
        overview: StatsOverview {
            total_games,
            correct_decisions,
            accuracy,
            average_time_ms,
            current_level: progress.level,
            current_focus: progress.current_focus.clone(),
        },
        trends: trends.into_iter().skip(skip).collect(),
        recent_sessions: sessions.iter().take(10).cloned().collect(),
    }
}

fn percent(part: u64, whole: u64) -> u32 {
    if whole == 0 {
        0
    } else {
        ((part as f64 / whole as f64) * 100.0).round() as u32
    }
}
