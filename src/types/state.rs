//! Game state definitions

use serde::{Deserialize, Serialize};

/// The five states of a game
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "state")]
pub enum GameState {
    /// Nothing running, waiting for the start action
    #[default]
    Idle,
    /// Camera access requested, model loading
    AwaitingPermission,
    /// Detection armed; `awaiting_next_attempt` is the cooldown flag
    Active { awaiting_next_attempt: bool },
    /// Correct key seen, gate animation playing
    Opening,
    /// Hallway visible, game over
    Revealed,
}

impl GameState {
    /// Is a playthrough in progress (camera held)?
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            GameState::AwaitingPermission | GameState::Active { .. } | GameState::Opening
        )
    }

    /// Terminal state, only a reload replays
    pub fn is_terminal(&self) -> bool {
        *self == GameState::Revealed
    }

    /// Get ANSI color code for terminal display
    pub fn color_code(&self) -> &'static str {
        match self {
            GameState::Idle => "\x1b[90m",                  // Gray
            GameState::AwaitingPermission => "\x1b[36m",    // Cyan
            GameState::Active { awaiting_next_attempt: false } => "\x1b[33m", // Yellow
            GameState::Active { awaiting_next_attempt: true } => "\x1b[35m",  // Magenta
            GameState::Opening => "\x1b[32m",               // Green
            GameState::Revealed => "\x1b[1;32m",            // Bold green
        }
    }

    /// Reset ANSI color
    pub fn color_reset() -> &'static str {
        "\x1b[0m"
    }

    /// Get emoji for state
    pub fn emoji(&self) -> &'static str {
        match self {
            GameState::Idle => "💤",
            GameState::AwaitingPermission => "📷",
            GameState::Active { awaiting_next_attempt: false } => "👁",
            GameState::Active { awaiting_next_attempt: true } => "⏳",
            GameState::Opening => "🚪",
            GameState::Revealed => "✨",
        }
    }
}

impl std::fmt::Display for GameState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GameState::Idle => "IDLE",
            GameState::AwaitingPermission => "AWAITING_PERMISSION",
            GameState::Active { awaiting_next_attempt: false } => "ACTIVE",
            GameState::Active { awaiting_next_attempt: true } => "ACTIVE(COOLDOWN)",
            GameState::Opening => "OPENING",
            GameState::Revealed => "REVEALED",
        };
        write!(f, "{}", name)
    }
}
