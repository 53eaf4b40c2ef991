//! Output structures for terminal display and the API

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use crate::types::{GameSession, GameState, ReasonCode};

/// Output structure for each controller step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameOutput {
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    /// Current state
    pub state: GameState,
    /// Reason for the current state
    pub reason: ReasonCode,
    /// Correct keys so far
    pub correct_attempts: u32,
    /// Incorrect keys so far
    pub incorrect_attempts: u32,
    /// Is detection currently accepting events?
    pub accepting: bool,
}

impl GameOutput {
    /// Create new output
    pub fn new(state: GameState, reason: ReasonCode, session: &GameSession) -> Self {
        Self {
            timestamp: Utc::now(),
            state,
            reason,
            correct_attempts: session.correct_attempt_count,
            incorrect_attempts: session.incorrect_attempt_count,
            accepting: session.accepts_detection(),
        }
    }

    /// Output before anything happened
    pub fn idle() -> Self {
        Self::new(GameState::Idle, ReasonCode::G001_IDLE, &GameSession::default())
    }

    /// Format for terminal display (with colors)
    pub fn to_terminal_string(&self) -> String {
        let color = self.state.color_code();
        let reset = GameState::color_reset();
        let emoji = self.state.emoji();

        format!(
            "{}{} state={} | correct={} | incorrect={} | {}{}",
            color,
            emoji,
            self.state,
            self.correct_attempts,
            self.incorrect_attempts,
            self.reason.code(),
            reset
        )
    }

    /// Format for parseable output (no colors)
    pub fn to_parseable_string(&self) -> String {
        format!(
            "state={} | correct={} | incorrect={} | reason={}",
            self.state,
            self.correct_attempts,
            self.incorrect_attempts,
            self.reason.code()
        )
    }
}
