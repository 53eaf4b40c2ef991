//! Game session record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The one piece of game state with a lifecycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameSession {
    /// A playthrough is in progress and detection may run
    pub active: bool,
    /// A decision is settling; no new detection may trigger
    pub awaiting_next_attempt: bool,
    /// Correct keys seen
    pub correct_attempt_count: u32,
    /// Incorrect keys seen
    pub incorrect_attempt_count: u32,
    /// When the camera was acquired
    pub started_at: Option<DateTime<Utc>>,
}

impl GameSession {
    /// Fresh active session
    pub fn begin() -> Self {
        Self {
            active: true,
            started_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// Can a detection event be accepted right now?
    pub fn accepts_detection(&self) -> bool {
        self.active && !self.awaiting_next_attempt
    }

    /// Deactivate; counters are kept for reporting
    pub fn end(&mut self) {
        self.active = false;
        self.awaiting_next_attempt = false;
    }
}
