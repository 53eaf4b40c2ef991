//! Core types for Escape Gate

mod state;
mod reason;
mod detection;
mod session;
mod output;
mod signal;
mod error;

pub use state::GameState;
pub use reason::ReasonCode;
pub use detection::{Prediction, Outcome, DetectionEvent};
pub use session::GameSession;
pub use output::GameOutput;
pub use signal::{PresentationSignal, SoundCue};
pub use error::GameError;
