//! Game states and the events emitted on transitions

use serde::{Deserialize, Serialize};

use super::board::WallPosition;
use crate::settings::Difficulty;

/// Phase of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameState {
    /// Waiting for all four wall corners to be seen together
    FindingWalls,
    /// Reading the config marker to set the reaction time
    SelectingDifficulty,
    /// Active play
    Playing,
    /// Out of lives
    GameLost,
    /// An invariant broke; the host must stop or restart
    Error,
}

impl GameState {
    /// `update` does nothing in these states
    pub fn is_terminal(&self) -> bool {
        matches!(self, GameState::GameLost | GameState::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GameState::FindingWalls => "FindingWalls",
            GameState::SelectingDifficulty => "SelectingDifficulty",
            GameState::Playing => "Playing",
            GameState::GameLost => "GameLost",
            GameState::Error => "Error",
        }
    }
}

/// Feedback for the renderer and audio. Drained by the host each frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    WallsFound,
    DifficultySelected {
        difficulty: Difficulty,
        reaction_time: f32,
        target: WallPosition,
    },
    ObjectiveCleared {
        score: u64,
        next: WallPosition,
    },
    LifeLost {
        lives: u32,
        next: WallPosition,
    },
    GameLost {
        score: u64,
    },
    Halted,
}
