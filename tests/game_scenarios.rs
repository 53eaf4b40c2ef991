//! Integration tests for the game controller
//!
//! Drives the controller directly with explicit instants:
//! capture → classifier → detection → controller → presentation + voice

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use escape_gate::config::GameConfig;
use escape_gate::core::controller::{
    MSG_ALREADY_RUNNING, MSG_CAMERA_DENIED, MSG_KEY_CORRECT, MSG_KEY_INCORRECT, MSG_MODEL_FAILED,
    MSG_REVEALED, MSG_VOICE_FAILED,
};
use escape_gate::core::{
    ChannelPresenter, Classifier, ClassifierLoader, Frame, GameController, ModelSource, PoseEstimate,
    ReplayClassifier, ReplayLoader, ReplayScript, ScriptStep, SyntheticCapture, VoiceEvent,
    VoiceNotifier, Vocabulary,
};
use escape_gate::types::{GameError, GameState, Prediction, PresentationSignal, ReasonCode};
use pretty_assertions::assert_eq;
use tokio::sync::broadcast;
use tokio::time::Instant;

// =============================================================================
// Helpers
// =============================================================================

/// Records every event it is told about
#[derive(Default)]
struct RecordingVoice {
    events: Mutex<Vec<VoiceEvent>>,
}

impl RecordingVoice {
    fn events(&self) -> Vec<VoiceEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl VoiceNotifier for RecordingVoice {
    async fn notify(&self, event: VoiceEvent) -> Result<(), GameError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// Always throws
struct FailingVoice;

#[async_trait]
impl VoiceNotifier for FailingVoice {
    async fn notify(&self, _event: VoiceEvent) -> Result<(), GameError> {
        Err(GameError::VoiceAssistant("assistant offline".to_string()))
    }
}

/// Slow to deliver "incorrect", records in completion order
#[derive(Default)]
struct SlowIncorrectVoice {
    delivered: Mutex<Vec<VoiceEvent>>,
}

#[async_trait]
impl VoiceNotifier for SlowIncorrectVoice {
    async fn notify(&self, event: VoiceEvent) -> Result<(), GameError> {
        if event == VoiceEvent::KeyIncorrect {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        self.delivered.lock().unwrap().push(event);
        Ok(())
    }
}

/// Replay classifier the test keeps a handle on
struct SharedClassifier(Arc<ReplayClassifier>);

#[async_trait]
impl Classifier for SharedClassifier {
    fn total_classes(&self) -> usize {
        self.0.total_classes()
    }

    async fn estimate(&self, frame: &Frame) -> Result<PoseEstimate, GameError> {
        self.0.estimate(frame).await
    }

    async fn predict(&self, pose: &PoseEstimate) -> Result<Vec<Prediction>, GameError> {
        self.0.predict(pose).await
    }
}

struct SharedLoader(Arc<ReplayClassifier>);

#[async_trait]
impl ClassifierLoader for SharedLoader {
    async fn load(&self, _source: &ModelSource) -> Result<Box<dyn Classifier>, GameError> {
        Ok(Box::new(SharedClassifier(Arc::clone(&self.0))))
    }
}

struct Harness {
    controller: GameController,
    signals: broadcast::Receiver<PresentationSignal>,
    voice: Arc<RecordingVoice>,
}

fn harness_with(config: GameConfig, voice: Arc<dyn VoiceNotifier>, recording: Arc<RecordingVoice>) -> Harness {
    let presenter = ChannelPresenter::new(256);
    let signals = presenter.subscribe();
    let controller = GameController::new(config, Arc::new(presenter), voice);
    Harness {
        controller,
        signals,
        voice: recording,
    }
}

fn harness() -> Harness {
    let voice = Arc::new(RecordingVoice::default());
    harness_with(GameConfig::default(), voice.clone(), voice)
}

fn loader(steps: Vec<ScriptStep>) -> ReplayLoader {
    ReplayLoader::offline(&["Clave", "Incorrecto"], ReplayScript::new(steps))
}

fn frames(label: &str, confidence: f64) -> ScriptStep {
    ScriptStep::once(vec![
        Prediction::new(label, confidence),
        Prediction::new("Fondo", 1.0 - confidence),
    ])
}

fn drain(rx: &mut broadcast::Receiver<PresentationSignal>) -> Vec<PresentationSignal> {
    let mut out = Vec::new();
    while let Ok(signal) = rx.try_recv() {
        out.push(signal);
    }
    out
}

fn statuses(signals: &[PresentationSignal]) -> Vec<String> {
    signals
        .iter()
        .filter_map(|s| s.status_text().map(str::to_string))
        .collect()
}

/// Let detached voice tasks run
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

async fn started(h: &mut Harness, steps: Vec<ScriptStep>) {
    let output = h.controller.start(&SyntheticCapture::granting(), &loader(steps)).await;
    assert_eq!(output.state, GameState::Active { awaiting_next_attempt: false });
    drain(&mut h.signals);
}

// =============================================================================
// Scenarios
// =============================================================================

/// Scenario 1: "Clave" at 0.95 opens the gate and ends the session
#[tokio::test]
async fn test_correct_key_opens_gate_and_reveals() {
    let mut h = harness();
    started(&mut h, vec![frames("Clave", 0.95)]).await;
    let t0 = Instant::now();

    let output = h.controller.tick(t0).await.expect("event applied");
    assert_eq!(output.state, GameState::Opening);
    assert_eq!(output.reason, ReasonCode::G004_KEY_CORRECT);
    assert_eq!(output.correct_attempts, 1);

    let signals = drain(&mut h.signals);
    assert!(signals.contains(&PresentationSignal::GateOpening));
    assert!(statuses(&signals).contains(&MSG_KEY_CORRECT.to_string()));

    // Animation still running
    assert!(h.controller.poll_timers(t0 + Duration::from_millis(1499)).is_none());
    assert_eq!(h.controller.state(), GameState::Opening);
    assert!(h.controller.session().active);

    let output = h.controller.poll_timers(t0 + Duration::from_millis(1500)).unwrap();
    assert_eq!(output.state, GameState::Revealed);
    assert!(!h.controller.session().active);
    assert!(!h.controller.capture_held());

    let signals = drain(&mut h.signals);
    assert!(signals.contains(&PresentationSignal::HallwayRevealed));
    assert!(statuses(&signals).contains(&MSG_REVEALED.to_string()));

    // Camera section hides 3s after the reveal
    h.controller.poll_timers(t0 + Duration::from_millis(4500));
    assert_eq!(
        drain(&mut h.signals),
        vec![PresentationSignal::CameraSection { visible: false }]
    );

    settle().await;
    assert_eq!(h.voice.events(), vec![VoiceEvent::KeyCorrect]);
}

/// Scenario 2: "Incorrecto" at 0.75 fails, then ticks resume after 2s
#[tokio::test]
async fn test_incorrect_key_then_cooldown_releases() {
    let mut h = harness();
    started(&mut h, vec![frames("Incorrecto", 0.75), frames("Clave", 0.95)]).await;
    let t0 = Instant::now();

    let output = h.controller.tick(t0).await.expect("event applied");
    assert_eq!(output.state, GameState::Active { awaiting_next_attempt: true });
    assert_eq!(output.incorrect_attempts, 1);
    assert_eq!(output.correct_attempts, 0);

    let signals = drain(&mut h.signals);
    assert!(statuses(&signals).contains(&MSG_KEY_INCORRECT.to_string()));
    settle().await;

    // Cooldown: ticks do nothing
    assert!(h.controller.tick(t0 + Duration::from_millis(500)).await.is_none());
    assert!(h.controller.poll_timers(t0 + Duration::from_millis(1999)).is_none());

    let output = h.controller.poll_timers(t0 + Duration::from_millis(2000)).unwrap();
    assert_eq!(output.state, GameState::Active { awaiting_next_attempt: false });
    assert_eq!(output.reason, ReasonCode::G003_COOLDOWN_ELAPSED);

    // Next scripted result is consumed now
    let output = h.controller.tick(t0 + Duration::from_millis(2033)).await.unwrap();
    assert_eq!(output.state, GameState::Opening);

    settle().await;
    assert_eq!(h.voice.events(), vec![VoiceEvent::KeyIncorrect, VoiceEvent::KeyCorrect]);
}

/// Scenario 3: below threshold, nothing happens
#[tokio::test]
async fn test_low_confidence_is_ignored() {
    let mut h = harness();
    started(&mut h, vec![frames("Clave", 0.5), frames("Incorrecto", 0.6)]).await;
    let t0 = Instant::now();

    assert!(h.controller.tick(t0).await.is_none());
    assert!(h.controller.tick(t0 + Duration::from_millis(33)).await.is_none());

    assert_eq!(h.controller.state(), GameState::Active { awaiting_next_attempt: false });
    assert_eq!(h.controller.session().correct_attempt_count, 0);
    assert_eq!(h.controller.session().incorrect_attempt_count, 0);
    assert!(drain(&mut h.signals).is_empty());
    assert_eq!(h.controller.detection().tick_count(), 2);
}

/// Scenario 4: camera refused, session stays idle
#[tokio::test]
async fn test_permission_denied_stays_idle() {
    let mut h = harness();
    let output = h
        .controller
        .start(&SyntheticCapture::denying(), &loader(vec![frames("Clave", 0.95)]))
        .await;

    assert_eq!(output.state, GameState::Idle);
    assert_eq!(output.reason, ReasonCode::G002_PERMISSION_DENIED);
    assert!(!output.accepting);
    assert!(!h.controller.session().active);

    let signals = drain(&mut h.signals);
    assert!(statuses(&signals).contains(&MSG_CAMERA_DENIED.to_string()));
    assert!(!signals.contains(&PresentationSignal::CameraSection { visible: true }));

    // Detection never starts
    assert!(h.controller.tick(Instant::now()).await.is_none());
    assert_eq!(h.controller.detection().tick_count(), 0);
    assert!(h.controller.next_deadline().is_none());
}

/// Scenario 5: voice failure does not affect the game
#[tokio::test]
async fn test_voice_failure_does_not_block_reveal() {
    let recording = Arc::new(RecordingVoice::default());
    let mut h = harness_with(GameConfig::default(), Arc::new(FailingVoice), recording);
    started(&mut h, vec![frames("Clave", 0.95)]).await;
    let t0 = Instant::now();

    let output = h.controller.tick(t0).await.unwrap();
    assert_eq!(output.state, GameState::Opening);

    settle().await;
    let output = h.controller.poll_timers(t0 + Duration::from_millis(1500)).unwrap();
    assert_eq!(output.state, GameState::Revealed);

    let signals = drain(&mut h.signals);
    assert!(statuses(&signals).contains(&MSG_VOICE_FAILED.to_string()));
    assert!(signals.contains(&PresentationSignal::HallwayRevealed));
}

// =============================================================================
// Properties
// =============================================================================

#[tokio::test]
async fn test_revealed_is_idempotent() {
    let mut h = harness();
    started(&mut h, vec![frames("Clave", 0.95)]).await;
    let t0 = Instant::now();
    h.controller.tick(t0).await.unwrap();
    h.controller.poll_timers(t0 + Duration::from_millis(1500)).unwrap();
    drain(&mut h.signals);

    for i in 0..5u64 {
        let later = t0 + Duration::from_millis(5000 + i * 2000);
        h.controller.poll_timers(later);
        let output = h.controller.simulate_key(true, later);
        assert_eq!(output.state, GameState::Revealed);
        assert_eq!(output.correct_attempts, 1);
        assert!(h.controller.tick(later).await.is_none());
        h.controller.force_open(later);
    }

    let signals = drain(&mut h.signals);
    assert!(!signals.contains(&PresentationSignal::GateOpening));
    assert!(!signals.contains(&PresentationSignal::HallwayRevealed));
}

#[tokio::test]
async fn test_cooldown_rejects_every_event_in_window() {
    let mut h = harness();
    started(&mut h, vec![]).await;
    let t0 = Instant::now();

    h.controller.simulate_key(false, t0);
    for ms in (100..2000).step_by(100) {
        let at = t0 + Duration::from_millis(ms);
        assert!(h.controller.poll_timers(at).is_none());
        let output = h.controller.simulate_key(false, at);
        assert_eq!(output.reason, ReasonCode::G003_DECISION_PENDING);
        assert_eq!(output.incorrect_attempts, 1);
    }

    h.controller.poll_timers(t0 + Duration::from_millis(2000));
    let output = h.controller.simulate_key(false, t0 + Duration::from_millis(2000));
    assert_eq!(output.incorrect_attempts, 2);
}

#[tokio::test]
async fn test_model_load_failure_releases_camera() {
    let mut config = GameConfig::default();
    config.model = "/nonexistent/escape-gate-model".to_string();
    let voice = Arc::new(RecordingVoice::default());
    let mut h = harness_with(config, voice.clone(), voice);

    let output = h
        .controller
        .start(
            &SyntheticCapture::granting(),
            &ReplayLoader::new(Vocabulary::FromModel, ReplayScript::default()),
        )
        .await;

    assert_eq!(output.state, GameState::Idle);
    assert_eq!(output.reason, ReasonCode::G002_MODEL_LOAD_FAILED);
    assert!(!h.controller.capture_held());
    assert!(!h.controller.accepts_detection());

    let signals = drain(&mut h.signals);
    assert!(statuses(&signals).contains(&MSG_MODEL_FAILED.to_string()));
    assert_eq!(
        signals.last(),
        Some(&PresentationSignal::Status {
            text: MSG_MODEL_FAILED.to_string(),
            display_ms: 4000
        })
    );
    assert!(signals.contains(&PresentationSignal::CameraSection { visible: false }));
}

#[tokio::test]
async fn test_start_while_running_is_rejected() {
    let mut h = harness();
    started(&mut h, vec![]).await;

    let output = h.controller.start(&SyntheticCapture::granting(), &loader(vec![])).await;
    assert_eq!(output.reason, ReasonCode::G001_ALREADY_RUNNING);
    assert_eq!(output.state, GameState::Active { awaiting_next_attempt: false });
    assert_eq!(statuses(&drain(&mut h.signals)), vec![MSG_ALREADY_RUNNING.to_string()]);
}

#[tokio::test]
async fn test_classifier_failure_skips_tick_only() {
    let mut h = harness();
    started(&mut h, vec![ScriptStep::failure("gpu lost"), frames("Clave", 0.95)]).await;
    let t0 = Instant::now();

    assert!(h.controller.tick(t0).await.is_none());
    assert_eq!(h.controller.detection().skipped_count(), 1);
    assert!(h.controller.accepts_detection());

    let output = h.controller.tick(t0 + Duration::from_millis(33)).await.unwrap();
    assert_eq!(output.state, GameState::Opening);
}

#[tokio::test]
async fn test_force_open_reveals_without_counting() {
    let mut h = harness();
    started(&mut h, vec![]).await;
    let t0 = Instant::now();

    let output = h.controller.force_open(t0);
    assert_eq!(output.state, GameState::Opening);
    assert_eq!(output.reason, ReasonCode::G004_FORCED_OPEN);
    assert_eq!(output.correct_attempts, 0);

    let output = h.controller.poll_timers(t0 + Duration::from_millis(1500)).unwrap();
    assert_eq!(output.state, GameState::Revealed);
}

#[tokio::test]
async fn test_teardown_releases_and_is_idempotent() {
    let mut h = harness();
    started(&mut h, vec![]).await;
    h.controller.simulate_key(false, Instant::now());
    assert!(h.controller.capture_held());

    let output = h.controller.teardown();
    assert_eq!(output.state, GameState::Idle);
    assert_eq!(output.reason, ReasonCode::G005_TORN_DOWN);
    assert!(!h.controller.capture_held());
    assert!(h.controller.next_deadline().is_none());

    let again = h.controller.teardown();
    assert_eq!(again.state, GameState::Idle);
}

#[tokio::test]
async fn test_lenient_profile_accepts_lower_confidence() {
    let mut config = GameConfig::default();
    config.matcher.profile = escape_gate::config::Profile::Lenient;
    let voice = Arc::new(RecordingVoice::default());
    let mut h = harness_with(config, voice.clone(), voice);
    started(&mut h, vec![frames("Clave", 0.82)]).await;

    let output = h.controller.tick(Instant::now()).await.unwrap();
    assert_eq!(output.state, GameState::Opening);
}

#[tokio::test]
async fn test_cooldown_holds_against_qualifying_frames() {
    let mut h = harness();
    let replay = Arc::new(ReplayClassifier::new(
        vec!["Clave".to_string(), "Incorrecto".to_string()],
        ReplayScript::new(vec![
            frames("Incorrecto", 0.75),
            ScriptStep::frames(vec![Prediction::new("Clave", 0.99)], 60),
        ]),
    ));
    let output = h
        .controller
        .start(&SyntheticCapture::granting(), &SharedLoader(Arc::clone(&replay)))
        .await;
    assert_eq!(output.state, GameState::Active { awaiting_next_attempt: false });
    let t0 = Instant::now();

    let output = h.controller.tick(t0).await.unwrap();
    assert_eq!(output.incorrect_attempts, 1);
    assert_eq!(replay.remaining(), 60);

    // Every frame inside the window would qualify, none is evaluated
    for i in 1..60u64 {
        let at = t0 + Duration::from_millis(i * 33);
        assert!(h.controller.poll_timers(at).is_none());
        assert!(h.controller.tick(at).await.is_none());
    }
    assert_eq!(replay.remaining(), 60);
    assert_eq!(h.controller.detection().tick_count(), 1);
    assert_eq!(h.controller.session().correct_attempt_count, 0);

    h.controller.poll_timers(t0 + Duration::from_millis(2000)).unwrap();
    let output = h.controller.tick(t0 + Duration::from_millis(2000)).await.unwrap();
    assert_eq!(output.state, GameState::Opening);
    assert_eq!(replay.remaining(), 59);
}

#[tokio::test(start_paused = true)]
async fn test_voice_events_delivered_in_order() {
    let voice = Arc::new(SlowIncorrectVoice::default());
    let recording = Arc::new(RecordingVoice::default());
    let mut h = harness_with(GameConfig::default(), voice.clone(), recording);
    started(&mut h, vec![]).await;
    let t0 = Instant::now();

    h.controller.simulate_key(false, t0);
    h.controller.poll_timers(t0 + Duration::from_millis(2000));
    let output = h.controller.simulate_key(true, t0 + Duration::from_millis(2000));
    assert_eq!(output.state, GameState::Opening);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(
        *voice.delivered.lock().unwrap(),
        vec![VoiceEvent::KeyIncorrect, VoiceEvent::KeyCorrect]
    );
}
