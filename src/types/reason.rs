//! Reason codes for controller decisions and state changes

use serde::{Deserialize, Serialize};

/// Reason codes for all state changes and decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum ReasonCode {
    // =========================================================================
    // G001: Start
    // =========================================================================
    /// Nothing started yet
    G001_IDLE,
    /// Start requested, asking for the camera
    G001_START_REQUESTED,
    /// Start ignored, a game is already running
    G001_ALREADY_RUNNING,

    // =========================================================================
    // G002: Capture + model
    // =========================================================================
    /// Camera acquired and model loaded, detection armed
    G002_DETECTION_ARMED,
    /// Camera permission refused
    G002_PERMISSION_DENIED,
    /// No camera device available
    G002_DEVICE_UNAVAILABLE,
    /// Classifier resources could not be loaded
    G002_MODEL_LOAD_FAILED,

    // =========================================================================
    // G003: Detection
    // =========================================================================
    /// Detection ignored while a decision is pending
    G003_DECISION_PENDING,
    /// Cooldown elapsed, new attempts accepted
    G003_COOLDOWN_ELAPSED,

    // =========================================================================
    // G004: Keys
    // =========================================================================
    /// Correct key detected
    G004_KEY_CORRECT,
    /// Incorrect key detected
    G004_KEY_INCORRECT,
    /// Gate forced open manually
    G004_FORCED_OPEN,

    // =========================================================================
    // G005: Gate
    // =========================================================================
    /// Hallway revealed, game finished
    G005_REVEALED,
    /// Game torn down before finishing
    G005_TORN_DOWN,
}

impl ReasonCode {
    /// Get the code string (for logging)
    pub fn code(&self) -> &'static str {
        match self {
            Self::G001_IDLE => "G001_IDLE",
            Self::G001_START_REQUESTED => "G001_START_REQUESTED",
            Self::G001_ALREADY_RUNNING => "G001_ALREADY_RUNNING",
            Self::G002_DETECTION_ARMED => "G002_DETECTION_ARMED",
            Self::G002_PERMISSION_DENIED => "G002_PERMISSION_DENIED",
            Self::G002_DEVICE_UNAVAILABLE => "G002_DEVICE_UNAVAILABLE",
            Self::G002_MODEL_LOAD_FAILED => "G002_MODEL_LOAD_FAILED",
            Self::G003_DECISION_PENDING => "G003_DECISION_PENDING",
            Self::G003_COOLDOWN_ELAPSED => "G003_COOLDOWN_ELAPSED",
            Self::G004_KEY_CORRECT => "G004_KEY_CORRECT",
            Self::G004_KEY_INCORRECT => "G004_KEY_INCORRECT",
            Self::G004_FORCED_OPEN => "G004_FORCED_OPEN",
            Self::G005_REVEALED => "G005_REVEALED",
            Self::G005_TORN_DOWN => "G005_TORN_DOWN",
        }
    }

    /// Get human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::G001_IDLE => "Waiting for start",
            Self::G001_START_REQUESTED => "Requesting camera",
            Self::G001_ALREADY_RUNNING => "Game already in progress",
            Self::G002_DETECTION_ARMED => "Detection armed",
            Self::G002_PERMISSION_DENIED => "Camera permission denied",
            Self::G002_DEVICE_UNAVAILABLE => "Camera unavailable",
            Self::G002_MODEL_LOAD_FAILED => "Model failed to load",
            Self::G003_DECISION_PENDING => "Decision pending",
            Self::G003_COOLDOWN_ELAPSED => "Ready for another attempt",
            Self::G004_KEY_CORRECT => "Correct key",
            Self::G004_KEY_INCORRECT => "Incorrect key",
            Self::G004_FORCED_OPEN => "Gate forced open",
            Self::G005_REVEALED => "Hallway revealed",
            Self::G005_TORN_DOWN => "Game torn down",
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.description())
    }
}
