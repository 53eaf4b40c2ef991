//! Core modules for Escape Gate

pub mod matcher;
pub mod capture;
pub mod model;
pub mod classifier;
pub mod detection;
pub mod voice;
pub mod presentation;
pub mod controller;
pub mod runner;
pub mod api;

pub use matcher::{LabelMatcher, OutcomeRule};
pub use capture::{CaptureRequest, CaptureSource, CaptureStream, Frame, SyntheticCapture};
pub use model::{LoadedModel, ModelMetadata, ModelSource, ModelTopology};
pub use classifier::{Classifier, ClassifierLoader, PoseEstimate, ReplayClassifier, ReplayLoader, ReplayScript, ScriptStep, Vocabulary};
pub use detection::{DetectionLoop, TickOutcome};
pub use voice::{AssistantEvent, NoVoice, VoiceAssistant, VoiceEvent, VoiceMessage, VoiceNotifier};
pub use presentation::{ChannelPresenter, Presenter, TerminalPresenter};
pub use controller::GameController;
pub use runner::{GameCommand, GameHandle, GameRunner};
pub use api::{create_router, run_server, spawn_game};
