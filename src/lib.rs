//! Escape Gate: secret-door escape room game
//!
//! Camera frames → pose classifier → detection loop → game controller →
//! gate animation, with an optional voice assistant told about each key.

pub mod config;
pub mod core;
pub mod types;

// =============================================================================
// CONFIDENCE THRESHOLDS [C]
// =============================================================================

/// Minimum confidence for a "correct key" label (standard profile)
pub const CORRECT_THRESHOLD: f64 = 0.90;

/// Minimum confidence for an "incorrect key" label (standard profile)
pub const INCORRECT_THRESHOLD: f64 = 0.70;

/// Threshold for both outcomes in the lenient (keyboard/pose) profile
pub const LENIENT_THRESHOLD: f64 = 0.80;

/// Candidates above this confidence are logged every tick
pub const DEBUG_LOG_CONFIDENCE: f64 = 0.5;

// =============================================================================
// DELAYS [C] - milliseconds
// =============================================================================

/// Gate animation length before the hallway is revealed
pub const GATE_OPENING_MS: u64 = 1500;

/// Cooldown after any decision before a new one is accepted
pub const COOLDOWN_MS: u64 = 2000;

/// Delay between the reveal and hiding the camera section
pub const CAMERA_HIDE_DELAY_MS: u64 = 3000;

/// How long a status message stays on screen
pub const STATUS_DISPLAY_MS: u64 = 4000;

/// Detection tick interval (~30 fps)
pub const FRAME_INTERVAL_MS: u64 = 33;

// =============================================================================
// CAPTURE [C]
// =============================================================================

/// Ideal capture width requested from the camera
pub const CAPTURE_IDEAL_WIDTH: u32 = 1280;

/// Ideal capture height requested from the camera
pub const CAPTURE_IDEAL_HEIGHT: u32 = 720;

// =============================================================================
// VERSION
// =============================================================================

pub const VERSION: &str = "1.0.0";
