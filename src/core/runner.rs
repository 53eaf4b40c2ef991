//! Game runner: the one task that owns the controller
//!
//! Every decision is made on this task, in order. It wakes for the stop
//! signal, a command, the earliest timer deadline, or a frame tick (only
//! while detection is accepting events).

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::core::capture::CaptureSource;
use crate::core::classifier::ClassifierLoader;
use crate::core::controller::GameController;
use crate::types::{GameError, GameOutput};

/// User actions accepted by the runner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameCommand {
    /// The start button
    Start,
    /// Keyboard fallback / debug key
    SimulateKey { correct: bool },
    /// Debug: open the gate without a key
    ForceOpen,
    /// Tear down and exit the runner
    Stop,
}

/// Cloneable handle for talking to a running game
#[derive(Debug, Clone)]
pub struct GameHandle {
    commands: mpsc::Sender<GameCommand>,
    status: watch::Receiver<GameOutput>,
    stop: Arc<watch::Sender<bool>>,
}

impl GameHandle {
    /// Queue a command
    pub async fn send(&self, command: GameCommand) -> Result<(), GameError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| GameError::RunnerStopped)
    }

    pub async fn start(&self) -> Result<(), GameError> {
        self.send(GameCommand::Start).await
    }

    pub async fn simulate_key(&self, correct: bool) -> Result<(), GameError> {
        self.send(GameCommand::SimulateKey { correct }).await
    }

    pub async fn force_open(&self) -> Result<(), GameError> {
        self.send(GameCommand::ForceOpen).await
    }

    /// Signal cancellation; the runner tears down on its next wake
    pub fn stop(&self) {
        // Runner already gone is fine
        let _ = self.stop.send(true);
    }

    /// Latest published output
    pub fn status(&self) -> GameOutput {
        self.status.borrow().clone()
    }

    /// Watch published outputs
    pub fn subscribe(&self) -> watch::Receiver<GameOutput> {
        self.status.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// Owns the controller and its collaborators
pub struct GameRunner {
    controller: GameController,
    source: Arc<dyn CaptureSource>,
    loader: Arc<dyn ClassifierLoader>,
    commands: mpsc::Receiver<GameCommand>,
    status: watch::Sender<GameOutput>,
    stop: watch::Receiver<bool>,
}

impl GameRunner {
    /// Create a runner and its handle
    pub fn new(
        controller: GameController,
        source: Arc<dyn CaptureSource>,
        loader: Arc<dyn ClassifierLoader>,
    ) -> (Self, GameHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (status_tx, status_rx) = watch::channel(controller.output());
        let (stop_tx, stop_rx) = watch::channel(false);

        let runner = Self {
            controller,
            source,
            loader,
            commands: command_rx,
            status: status_tx,
            stop: stop_rx,
        };
        let handle = GameHandle {
            commands: command_tx,
            status: status_rx,
            stop: Arc::new(stop_tx),
        };
        (runner, handle)
    }

    /// Run on a new task
    pub fn spawn(self) -> JoinHandle<GameOutput> {
        tokio::spawn(self.run())
    }

    /// Run until stopped; returns the final output
    pub async fn run(mut self) -> GameOutput {
        let mut frames = time::interval(self.controller.config().timing.frame_interval());
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("game runner started");

        loop {
            let deadline = self.controller.next_deadline();
            let detecting = self.controller.accepts_detection();
            let far = Instant::now() + Duration::from_secs(3600);

            tokio::select! {
                biased;

                changed = self.stop.changed() => {
                    if changed.is_err() || *self.stop.borrow() {
                        break;
                    }
                }

                command = self.commands.recv() => match command {
                    None | Some(GameCommand::Stop) => break,
                    Some(command) => {
                        if self.handle(command).await.is_break() {
                            break;
                        }
                    }
                },

                _ = time::sleep_until(deadline.unwrap_or(far)), if deadline.is_some() => {
                    self.controller.poll_timers(Instant::now());
                }

                _ = frames.tick(), if detecting => {
                    self.controller.tick(Instant::now()).await;
                }
            }

            self.publish();
        }

        self.controller.teardown();
        self.publish();
        info!(
            ticks = self.controller.detection().tick_count(),
            skipped = self.controller.detection().skipped_count(),
            "game runner stopped"
        );
        self.controller.output()
    }

    /// Apply one command; `Break` when the stop signal arrived meanwhile
    async fn handle(&mut self, command: GameCommand) -> ControlFlow<()> {
        debug!(?command, "command");
        let now = Instant::now();
        match command {
            GameCommand::Start => {
                if !self.controller.begin_start() {
                    return ControlFlow::Continue(());
                }
                // AWAITING_PERMISSION is visible while the camera and model load
                self.publish();
                tokio::select! {
                    biased;

                    changed = self.stop.changed() => {
                        if changed.is_err() || *self.stop.borrow() {
                            info!("stop requested during start");
                            return ControlFlow::Break(());
                        }
                    }

                    _ = self.controller.acquire(self.source.as_ref(), self.loader.as_ref()) => {}
                }
            }
            GameCommand::SimulateKey { correct } => {
                self.controller.simulate_key(correct, now);
            }
            GameCommand::ForceOpen => {
                self.controller.force_open(now);
            }
            GameCommand::Stop => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    /// Publish the controller output when it changed
    fn publish(&self) {
        let next = self.controller.output();
        self.status.send_if_modified(|current| {
            let same = current.state == next.state
                && current.reason == next.reason
                && current.correct_attempts == next.correct_attempts
                && current.incorrect_attempts == next.incorrect_attempts
                && current.accepting == next.accepting;
            if !same {
                *current = next.clone();
            }
            !same
        });
    }
}
