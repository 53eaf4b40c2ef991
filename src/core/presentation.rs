//! Presentation layer: one-way signals from the controller to the screen

use std::time::Duration;

use colored::Colorize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::types::{PresentationSignal, SoundCue};

/// Consumer of presentation signals; nothing flows back
pub trait Presenter: Send + Sync {
    /// Show a status line for `display`
    fn show_status(&self, text: &str, display: Duration);

    /// Start the gate-opening animation
    fn open_gate(&self);

    /// Make the hallway visible
    fn reveal_hallway(&self);

    fn set_camera_visible(&self, visible: bool);

    /// Sound files are not shipped; implementations only log
    fn play_sound(&self, cue: SoundCue) {
        debug!(?cue, "sound disabled");
    }
}

/// Prints signals to the terminal
#[derive(Debug, Clone, Default)]
pub struct TerminalPresenter {
    pub no_color: bool,
}

impl TerminalPresenter {
    pub fn new(no_color: bool) -> Self {
        Self { no_color }
    }

    fn line(&self, tag: &str, text: &str, paint: fn(&str) -> colored::ColoredString) {
        if self.no_color {
            println!("[{}] {}", tag, text);
        } else {
            println!("{} {}", paint(&format!("[{}]", tag)), text);
        }
    }
}

impl Presenter for TerminalPresenter {
    fn show_status(&self, text: &str, _display: Duration) {
        self.line("status", text, |s| s.cyan());
    }

    fn open_gate(&self) {
        self.line("gate", "the doors begin to swing open...", |s| s.green().bold());
    }

    fn reveal_hallway(&self) {
        self.line("hallway", "a hidden hallway lies beyond the gate", |s| s.green().bold());
    }

    fn set_camera_visible(&self, visible: bool) {
        let text = if visible { "camera on" } else { "camera off" };
        self.line("camera", text, |s| s.dimmed());
    }

    fn play_sound(&self, cue: SoundCue) {
        debug!(?cue, "sound disabled");
        self.line("sound", &format!("{:?} (disabled)", cue), |s| s.dimmed());
    }
}

/// Forwards signals over a broadcast channel (WebSocket clients, tests)
#[derive(Debug, Clone)]
pub struct ChannelPresenter {
    tx: broadcast::Sender<PresentationSignal>,
}

impl ChannelPresenter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PresentationSignal> {
        self.tx.subscribe()
    }

    pub fn sender(&self) -> broadcast::Sender<PresentationSignal> {
        self.tx.clone()
    }

    fn send(&self, signal: PresentationSignal) {
        // Nobody watching is not an error
        let _ = self.tx.send(signal);
    }
}

impl Presenter for ChannelPresenter {
    fn show_status(&self, text: &str, display: Duration) {
        self.send(PresentationSignal::Status {
            text: text.to_string(),
            display_ms: display.as_millis() as u64,
        });
    }

    fn open_gate(&self) {
        self.send(PresentationSignal::GateOpening);
    }

    fn reveal_hallway(&self) {
        self.send(PresentationSignal::HallwayRevealed);
    }

    fn set_camera_visible(&self, visible: bool) {
        self.send(PresentationSignal::CameraSection { visible });
    }

    fn play_sound(&self, cue: SoundCue) {
        debug!(?cue, "sound disabled");
        self.send(PresentationSignal::Sound { cue });
    }
}
