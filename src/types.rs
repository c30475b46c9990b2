//! Shared identifiers, states, and session enums used across the engine.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Unique, strictly increasing identifier for an item (starts at 1).
pub type ItemId = u64;
/// 1-based identifier for a worker.
pub type WorkerId = u32;
/// 1-based identifier for a station.
pub type StationId = u32;

/// Lifecycle of an item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemState {
    Pending,
    Assigned,
    Resolved,
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ItemState::Pending => "PENDING",
            ItemState::Assigned => "ASSIGNED",
            ItemState::Resolved => "RESOLVED",
        };
        f.pad(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    Free,
    Busy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StationState {
    Free,
    Occupied,
}

/// Session difficulty; drives presets, kind weights, and password length.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn name(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown difficulty: {0} (expected easy, medium, or hard)")]
pub struct ParseDifficultyError(pub String);

impl FromStr for Difficulty {
    type Err = ParseDifficultyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" | "e" | "1" => Ok(Difficulty::Easy),
            "medium" | "m" | "2" => Ok(Difficulty::Medium),
            "hard" | "h" | "3" => Ok(Difficulty::Hard),
            _ => Err(ParseDifficultyError(s.to_string())),
        }
    }
}

/// How a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Required number of items resolved before the clock ran out.
    Won,
    /// Session clock expired first.
    Lost,
    /// Player quit from the coordinator.
    Quit,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Outcome::Won => "won",
            Outcome::Lost => "lost",
            Outcome::Quit => "quit",
        };
        f.write_str(name)
    }
}
