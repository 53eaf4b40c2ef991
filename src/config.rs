//! Game configuration
//!
//! Every field defaults to the constants in the crate root, so an empty JSON
//! object is a valid config file. CLI flags are applied on top by `main`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::GameError;
use crate::{
    CAMERA_HIDE_DELAY_MS, CAPTURE_IDEAL_HEIGHT, CAPTURE_IDEAL_WIDTH, COOLDOWN_MS,
    CORRECT_THRESHOLD, FRAME_INTERVAL_MS, GATE_OPENING_MS, INCORRECT_THRESHOLD,
    LENIENT_THRESHOLD, STATUS_DISPLAY_MS,
};

/// Hosted pose model the game was trained against
pub const DEFAULT_MODEL_URL: &str = "https://teachablemachine.withgoogle.com/models/YsCOZ0rkm/";

/// Threshold profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// 0.90 correct / 0.70 incorrect
    #[default]
    Standard,
    /// 0.80 for both, used by the keyboard/pose variant
    Lenient,
}

/// Label synonyms and thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub profile: Profile,
    /// Overrides the profile's correct threshold
    pub correct_threshold: Option<f64>,
    /// Overrides the profile's incorrect threshold
    pub incorrect_threshold: Option<f64>,
    pub correct_labels: Vec<String>,
    pub incorrect_labels: Vec<String>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            profile: Profile::Standard,
            correct_threshold: None,
            incorrect_threshold: None,
            correct_labels: ["Clave", "Llave", "Correcto", "Correct"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            incorrect_labels: ["Incorrecto", "Incorrecta", "Incorrect"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl MatcherConfig {
    pub fn effective_correct_threshold(&self) -> f64 {
        self.correct_threshold.unwrap_or(match self.profile {
            Profile::Standard => CORRECT_THRESHOLD,
            Profile::Lenient => LENIENT_THRESHOLD,
        })
    }

    pub fn effective_incorrect_threshold(&self) -> f64 {
        self.incorrect_threshold.unwrap_or(match self.profile {
            Profile::Standard => INCORRECT_THRESHOLD,
            Profile::Lenient => LENIENT_THRESHOLD,
        })
    }
}

/// Delays, all in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub gate_opening_ms: u64,
    pub cooldown_ms: u64,
    pub camera_hide_delay_ms: u64,
    pub status_display_ms: u64,
    pub frame_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            gate_opening_ms: GATE_OPENING_MS,
            cooldown_ms: COOLDOWN_MS,
            camera_hide_delay_ms: CAMERA_HIDE_DELAY_MS,
            status_display_ms: STATUS_DISPLAY_MS,
            frame_interval_ms: FRAME_INTERVAL_MS,
        }
    }
}

impl TimingConfig {
    pub fn gate_opening(&self) -> Duration {
        Duration::from_millis(self.gate_opening_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn camera_hide_delay(&self) -> Duration {
        Duration::from_millis(self.camera_hide_delay_ms)
    }

    pub fn status_display(&self) -> Duration {
        Duration::from_millis(self.status_display_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}

/// Camera request parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// "environment" (rear) or "user" (front)
    pub facing_mode: String,
    pub ideal_width: u32,
    pub ideal_height: u32,
    /// Mirror frames before classification
    pub mirrored: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            facing_mode: "environment".to_string(),
            ideal_width: CAPTURE_IDEAL_WIDTH,
            ideal_height: CAPTURE_IDEAL_HEIGHT,
            mirrored: true,
        }
    }
}

/// Voice assistant settings; absent means no voice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceConfig {
    pub public_key: String,
    pub assistant_id: String,
    /// Webhook receiving assistant messages; logged only when unset
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Full game configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub matcher: MatcherConfig,
    pub timing: TimingConfig,
    pub capture: CaptureConfig,
    /// Base URL or local directory holding model.json + metadata.json
    pub model: String,
    pub voice: Option<VoiceConfig>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            matcher: MatcherConfig::default(),
            timing: TimingConfig::default(),
            capture: CaptureConfig::default(),
            model: DEFAULT_MODEL_URL.to_string(),
            voice: None,
        }
    }
}

impl GameConfig {
    /// Load and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GameError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| GameError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    /// Parse and validate JSON config text
    pub fn from_json(content: &str) -> Result<Self, GameError> {
        let config: GameConfig = serde_json::from_str(content)
            .map_err(|e| GameError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check thresholds and label sets
    pub fn validate(&self) -> Result<(), GameError> {
        for (name, value) in [
            ("correct_threshold", self.matcher.effective_correct_threshold()),
            ("incorrect_threshold", self.matcher.effective_incorrect_threshold()),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(GameError::Config(format!("{} must be in [0, 1], got {}", name, value)));
            }
        }
        if self.matcher.correct_labels.iter().all(|l| l.trim().is_empty()) {
            return Err(GameError::Config("correct_labels is empty".to_string()));
        }
        if self.matcher.incorrect_labels.iter().all(|l| l.trim().is_empty()) {
            return Err(GameError::Config("incorrect_labels is empty".to_string()));
        }
        if self.model.trim().is_empty() {
            return Err(GameError::Config("model source is empty".to_string()));
        }
        Ok(())
    }
}
