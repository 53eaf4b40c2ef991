//! Game controller: owns the session and reacts to detection events
//!
//! State transitions:
//! - IDLE → AWAITING_PERMISSION: start requested
//! - AWAITING_PERMISSION → IDLE: camera refused, or model failed to load
//! - AWAITING_PERMISSION → ACTIVE: camera acquired, model loaded
//! - ACTIVE → ACTIVE(COOLDOWN): any key detected
//! - ACTIVE(COOLDOWN) → OPENING: the key was correct
//! - ACTIVE(COOLDOWN) → ACTIVE: cooldown elapsed
//! - OPENING → REVEALED: gate animation finished (terminal)
//!
//! Time is passed in by the caller so every transition is deterministic.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::config::GameConfig;
use crate::core::capture::{CaptureRequest, CaptureSource, CaptureStream};
use crate::core::classifier::{Classifier, ClassifierLoader};
use crate::core::detection::{DetectionLoop, TickOutcome};
use crate::core::matcher::LabelMatcher;
use crate::core::model::ModelSource;
use crate::core::presentation::Presenter;
use crate::core::voice::{VoiceEvent, VoiceNotifier};
use crate::types::{
    DetectionEvent, GameError, GameOutput, GameSession, GameState, Outcome, ReasonCode, SoundCue,
};

// =============================================================================
// STATUS MESSAGES
// =============================================================================

pub const MSG_ALREADY_RUNNING: &str = "The game is already in progress";
pub const MSG_ALREADY_OPEN: &str = "The door is already open. Reload to play again.";
pub const MSG_REQUESTING_CAMERA: &str = "Requesting camera permissions...";
pub const MSG_CAMERA_DENIED: &str = "Could not access the camera. Check the permissions.";
pub const MSG_CAMERA_MISSING: &str = "No camera available on this device.";
pub const MSG_CAMERA_ACTIVE: &str = "Camera active. Show the key to the magic eye";
pub const MSG_LOADING_MODEL: &str = "Loading the pose detection model...";
pub const MSG_MODEL_FAILED: &str = "Error loading the detection model. Check the connection.";
pub const MSG_KEY_CORRECT: &str = "Correct key detected! Opening the door...";
pub const MSG_KEY_INCORRECT: &str = "Wrong key. The door remains sealed.";
pub const MSG_REVEALED: &str = "You have crossed the threshold! The secrets await you...";
pub const MSG_VOICE_FAILED: &str = "Voice assistant unavailable";

/// Internal phase; `GameState` adds the cooldown flag from the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    AwaitingPermission,
    Active,
    Opening,
    Revealed,
}

/// Pending timer deadlines
#[derive(Debug, Clone, Copy, Default)]
struct Timers {
    cooldown_until: Option<Instant>,
    gate_opened_at: Option<Instant>,
    camera_hide_at: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timer {
    Cooldown,
    GateOpened,
    CameraHide,
}

impl Timers {
    fn earliest(&self) -> Option<(Timer, Instant)> {
        [
            (Timer::Cooldown, self.cooldown_until),
            (Timer::GateOpened, self.gate_opened_at),
            (Timer::CameraHide, self.camera_hide_at),
        ]
        .into_iter()
        .filter_map(|(timer, at)| at.map(|at| (timer, at)))
        .min_by_key(|(_, at)| *at)
    }

    fn clear(&mut self, timer: Timer) {
        match timer {
            Timer::Cooldown => self.cooldown_until = None,
            Timer::GateOpened => self.gate_opened_at = None,
            Timer::CameraHide => self.camera_hide_at = None,
        }
    }
}

/// Game state machine
pub struct GameController {
    config: GameConfig,
    phase: Phase,
    reason: ReasonCode,
    session: GameSession,
    detection: DetectionLoop,
    timers: Timers,
    capture: Option<Box<dyn CaptureStream>>,
    classifier: Option<Box<dyn Classifier>>,
    presenter: Arc<dyn Presenter>,
    voice: Arc<dyn VoiceNotifier>,
    /// Feeds the voice task; spawned on the first notification
    voice_tx: Option<mpsc::UnboundedSender<VoiceEvent>>,
}

impl std::fmt::Debug for GameController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameController")
            .field("state", &self.state())
            .field("reason", &self.reason)
            .field("session", &self.session)
            .field("capture_live", &self.capture.as_ref().map(|c| c.is_live()))
            .finish()
    }
}

impl GameController {
    /// Create a controller in IDLE
    pub fn new(config: GameConfig, presenter: Arc<dyn Presenter>, voice: Arc<dyn VoiceNotifier>) -> Self {
        let detection = DetectionLoop::new(LabelMatcher::from_config(&config.matcher));
        Self {
            config,
            phase: Phase::Idle,
            reason: ReasonCode::G001_IDLE,
            session: GameSession::default(),
            detection,
            timers: Timers::default(),
            capture: None,
            classifier: None,
            presenter,
            voice,
            voice_tx: None,
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Current state
    pub fn state(&self) -> GameState {
        match self.phase {
            Phase::Idle => GameState::Idle,
            Phase::AwaitingPermission => GameState::AwaitingPermission,
            Phase::Active => GameState::Active {
                awaiting_next_attempt: self.session.awaiting_next_attempt,
            },
            Phase::Opening => GameState::Opening,
            Phase::Revealed => GameState::Revealed,
        }
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn reason(&self) -> ReasonCode {
        self.reason
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn detection(&self) -> &DetectionLoop {
        &self.detection
    }

    /// Does the controller hold a live camera stream?
    pub fn capture_held(&self) -> bool {
        self.capture.as_ref().map(|c| c.is_live()).unwrap_or(false)
    }

    /// Would a detection event be accepted right now?
    pub fn accepts_detection(&self) -> bool {
        self.phase == Phase::Active && self.session.accepts_detection()
    }

    /// Earliest pending timer
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.earliest().map(|(_, at)| at)
    }

    /// Get current output without changing anything
    pub fn output(&self) -> GameOutput {
        GameOutput::new(self.state(), self.reason, &self.session)
    }

    // =========================================================================
    // Start
    // =========================================================================

    /// Start a game: request the camera, then load the classifier
    pub async fn start(&mut self, source: &dyn CaptureSource, loader: &dyn ClassifierLoader) -> GameOutput {
        if !self.begin_start() {
            return self.output();
        }
        self.acquire(source, loader).await
    }

    /// The start button: IDLE → AWAITING_PERMISSION
    ///
    /// Returns `false` when a game is already running or finished; the
    /// caller must then skip `acquire`.
    pub fn begin_start(&mut self) -> bool {
        match self.phase {
            Phase::Idle => {}
            Phase::Revealed => {
                self.status(MSG_ALREADY_OPEN);
                return false;
            }
            _ => {
                self.status(MSG_ALREADY_RUNNING);
                self.reason = ReasonCode::G001_ALREADY_RUNNING;
                return false;
            }
        }

        self.phase = Phase::AwaitingPermission;
        self.reason = ReasonCode::G001_START_REQUESTED;
        self.status(MSG_REQUESTING_CAMERA);
        true
    }

    /// Acquire the camera and load the classifier after `begin_start`
    ///
    /// Dropping this future part way leaves the controller in
    /// AWAITING_PERMISSION; `teardown` releases whatever was acquired.
    pub async fn acquire(&mut self, source: &dyn CaptureSource, loader: &dyn ClassifierLoader) -> GameOutput {
        if self.phase != Phase::AwaitingPermission {
            return self.output();
        }

        let request = CaptureRequest::from(&self.config.capture);
        let stream = match source.request(&request).await {
            Ok(stream) => stream,
            Err(e) => return self.fail_start(e),
        };
        self.capture = Some(stream);
        self.session = GameSession::begin();
        self.presenter.set_camera_visible(true);
        self.status(MSG_CAMERA_ACTIVE);

        self.status(MSG_LOADING_MODEL);
        let model = ModelSource::parse(&self.config.model);
        match loader.load(&model).await {
            Ok(classifier) => {
                info!(classes = classifier.total_classes(), "classifier ready");
                self.classifier = Some(classifier);
            }
            Err(e) => return self.fail_start(e),
        }

        self.phase = Phase::Active;
        self.reason = ReasonCode::G002_DETECTION_ARMED;
        let key_label = self
            .config
            .matcher
            .correct_labels
            .first()
            .map(String::as_str)
            .unwrap_or("key");
        self.status(&format!("Model ready! Show the \"{}\" pose to open the door", key_label));
        self.output()
    }

    fn fail_start(&mut self, e: GameError) -> GameOutput {
        error!(error = %e, "game start failed");
        let (message, reason) = match &e {
            GameError::PermissionDenied(_) => (MSG_CAMERA_DENIED, ReasonCode::G002_PERMISSION_DENIED),
            GameError::DeviceUnavailable(_) => (MSG_CAMERA_MISSING, ReasonCode::G002_DEVICE_UNAVAILABLE),
            _ => (MSG_MODEL_FAILED, ReasonCode::G002_MODEL_LOAD_FAILED),
        };
        let had_camera = self.capture.is_some();
        self.release_resources();
        self.session.end();
        if had_camera {
            self.presenter.set_camera_visible(false);
        }
        self.phase = Phase::Idle;
        self.reason = reason;
        self.status(message);
        if e.is_capture_failure() {
            self.presenter.play_sound(SoundCue::Error);
        }
        self.output()
    }

    // =========================================================================
    // Detection
    // =========================================================================

    /// Run one detection tick; `Some` when an event was applied
    pub async fn tick(&mut self, now: Instant) -> Option<GameOutput> {
        if !self.accepts_detection() {
            return None;
        }
        let (Some(stream), Some(classifier)) = (self.capture.as_deref_mut(), self.classifier.as_deref()) else {
            return None;
        };
        match self.detection.tick(stream, classifier, false).await {
            TickOutcome::Event(event) => Some(self.on_detection(event, now)),
            TickOutcome::NoSignal | TickOutcome::Pending | TickOutcome::Skipped(_) => None,
        }
    }

    /// Apply a detection event
    ///
    /// Ignored unless ACTIVE with no decision pending. Sets the cooldown
    /// flag before anything else.
    pub fn on_detection(&mut self, event: DetectionEvent, now: Instant) -> GameOutput {
        if !self.accepts_detection() {
            if self.phase == Phase::Active {
                self.reason = ReasonCode::G003_DECISION_PENDING;
            }
            return self.output();
        }

        self.session.awaiting_next_attempt = true;
        self.timers.cooldown_until = Some(now + self.config.timing.cooldown());

        match event.outcome {
            Outcome::Correct => {
                self.session.correct_attempt_count += 1;
                info!(
                    attempts = self.session.correct_attempt_count,
                    label = %event.label,
                    "correct key"
                );
                self.status(MSG_KEY_CORRECT);
                self.begin_opening(now);
                self.reason = ReasonCode::G004_KEY_CORRECT;
                self.notify_voice(VoiceEvent::KeyCorrect);
            }
            Outcome::Incorrect => {
                self.session.incorrect_attempt_count += 1;
                info!(label = %event.label, "incorrect key");
                self.reason = ReasonCode::G004_KEY_INCORRECT;
                self.status(MSG_KEY_INCORRECT);
                self.presenter.play_sound(SoundCue::Error);
                self.notify_voice(VoiceEvent::KeyIncorrect);
            }
        }
        self.output()
    }

    /// Manual key press, same cooldown guard as the camera
    pub fn simulate_key(&mut self, correct: bool, now: Instant) -> GameOutput {
        info!(correct, "simulated key");
        self.on_detection(DetectionEvent::manual(correct), now)
    }

    /// Open the gate without a key; only from ACTIVE
    pub fn force_open(&mut self, now: Instant) -> GameOutput {
        if self.phase != Phase::Active {
            return self.output();
        }
        warn!("forcing gate open");
        self.session.awaiting_next_attempt = true;
        self.begin_opening(now);
        self.reason = ReasonCode::G004_FORCED_OPEN;
        self.output()
    }

    fn begin_opening(&mut self, now: Instant) {
        self.phase = Phase::Opening;
        self.presenter.open_gate();
        self.presenter.play_sound(SoundCue::DoorOpen);
        self.timers.gate_opened_at = Some(now + self.config.timing.gate_opening());
    }

    // =========================================================================
    // Timers
    // =========================================================================

    /// Fire every timer due at `now`, in deadline order
    ///
    /// Returns `Some` when anything fired.
    pub fn poll_timers(&mut self, now: Instant) -> Option<GameOutput> {
        let mut fired = false;
        while let Some((timer, at)) = self.timers.earliest() {
            if at > now {
                break;
            }
            self.timers.clear(timer);
            self.fire(timer, at);
            fired = true;
        }
        fired.then(|| self.output())
    }

    fn fire(&mut self, timer: Timer, at: Instant) {
        match timer {
            Timer::Cooldown => {
                self.session.awaiting_next_attempt = false;
                if self.phase == Phase::Active {
                    self.reason = ReasonCode::G003_COOLDOWN_ELAPSED;
                }
            }
            Timer::GateOpened => {
                if self.phase != Phase::Opening {
                    return;
                }
                self.presenter.reveal_hallway();
                self.phase = Phase::Revealed;
                self.reason = ReasonCode::G005_REVEALED;
                self.status(MSG_REVEALED);
                self.stop_game();
                self.timers.camera_hide_at = Some(at + self.config.timing.camera_hide_delay());
                info!(
                    correct = self.session.correct_attempt_count,
                    incorrect = self.session.incorrect_attempt_count,
                    "gate open, game finished"
                );
            }
            Timer::CameraHide => self.presenter.set_camera_visible(false),
        }
    }

    fn stop_game(&mut self) {
        self.session.end();
        self.timers.cooldown_until = None;
        self.release_resources();
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Release everything (page unload); safe to call twice
    pub fn teardown(&mut self) -> GameOutput {
        let was_running = self.phase != Phase::Idle && self.phase != Phase::Revealed;
        let had_camera = self.capture.is_some();
        self.timers = Timers::default();
        self.stop_game();
        if had_camera {
            self.presenter.set_camera_visible(false);
        }
        if was_running {
            self.phase = Phase::Idle;
            self.reason = ReasonCode::G005_TORN_DOWN;
            info!("game torn down");
        }
        self.output()
    }

    fn release_resources(&mut self) {
        if let Some(mut stream) = self.capture.take() {
            stream.stop();
        }
        self.classifier = None;
    }

    // =========================================================================
    // Side channels
    // =========================================================================

    fn status(&self, text: &str) {
        self.presenter.show_status(text, self.config.timing.status_display());
    }

    /// Queue a voice notification
    ///
    /// One task delivers events in the order they were queued. Failures only
    /// produce a log line and a status; the game never waits on voice.
    fn notify_voice(&mut self, event: VoiceEvent) {
        let delivered = match &self.voice_tx {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        };
        if delivered {
            return;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        // Fresh receiver, cannot fail
        let _ = tx.send(event);
        tokio::spawn(voice_worker(
            rx,
            Arc::clone(&self.voice),
            Arc::clone(&self.presenter),
            self.config.timing.status_display(),
        ));
        self.voice_tx = Some(tx);
    }
}

/// Delivers voice events one at a time until the controller is dropped
async fn voice_worker(
    mut rx: mpsc::UnboundedReceiver<VoiceEvent>,
    voice: Arc<dyn VoiceNotifier>,
    presenter: Arc<dyn Presenter>,
    display: Duration,
) {
    while let Some(event) = rx.recv().await {
        if let Err(e) = voice.notify(event).await {
            warn!(error = %e, event = event.name(), "voice notification failed");
            presenter.show_status(MSG_VOICE_FAILED, display);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
