//! Error taxonomy

use thiserror::Error;

/// Every failure the game can surface
///
/// None of these end the process: the controller turns each one into a
/// status message and leaves the game inert or unchanged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GameError {
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),

    #[error("camera device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("classifier model failed to load: {0}")]
    ModelLoad(String),

    #[error("classifier failed: {0}")]
    ClassifierRuntime(String),

    #[error("voice assistant failed: {0}")]
    VoiceAssistant(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("game runner stopped")]
    RunnerStopped,
}

impl GameError {
    /// Errors the capture source may report at start
    pub fn is_capture_failure(&self) -> bool {
        matches!(self, GameError::PermissionDenied(_) | GameError::DeviceUnavailable(_))
    }
}
