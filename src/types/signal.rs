//! One-way signals sent to the presentation layer

use serde::{Deserialize, Serialize};

/// Sound cues; audio files are not shipped so these only log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundCue {
    DoorOpen,
    Error,
}

/// Everything the controller can tell the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PresentationSignal {
    /// Show a status line for `display_ms`
    Status { text: String, display_ms: u64 },
    /// Start the gate-opening animation
    GateOpening,
    /// Make the hallway visible
    HallwayRevealed,
    /// Show or hide the camera section
    CameraSection { visible: bool },
    /// Play a sound cue
    Sound { cue: SoundCue },
}

impl PresentationSignal {
    /// Status text, if this is a status signal
    pub fn status_text(&self) -> Option<&str> {
        match self {
            PresentationSignal::Status { text, .. } => Some(text),
            _ => None,
        }
    }
}
