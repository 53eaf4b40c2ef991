//! HTTP + WebSocket API for a browser front end
//!
//! Endpoints:
//! - GET /health - Health check
//! - GET /game - Current game output
//! - POST /game/start - Press the start button
//! - POST /game/key - Manual key {correct: bool}
//! - POST /game/open - Force the gate open
//! - POST /game/stop - Tear the game down
//! - WS /ws - Live presentation signals

use axum::{
    extract::{State, WebSocketUpgrade, ws::{Message, WebSocket}},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::GameConfig;
use crate::core::{
    CaptureSource, ChannelPresenter, ClassifierLoader, GameCommand, GameController, GameHandle,
    GameRunner, VoiceNotifier,
};
use crate::types::{GameError, GameOutput, PresentationSignal};

/// App state
pub struct AppState {
    pub game: GameHandle,
    pub signals: broadcast::Sender<PresentationSignal>,
}

/// Manual key request
#[derive(Debug, Deserialize)]
pub struct KeyRequest {
    pub correct: bool,
}

/// Command accepted response
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub accepted: bool,
    pub command: String,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub state: String,
}

/// Create the API router
pub fn create_router(game: GameHandle, signals: broadcast::Sender<PresentationSignal>) -> Router {
    let state = Arc::new(AppState { game, signals });

    Router::new()
        .route("/health", get(health))
        .route("/game", get(get_game))
        .route("/game/start", post(start_game))
        .route("/game/key", post(simulate_key))
        .route("/game/open", post(force_open))
        .route("/game/stop", post(stop_game))
        .route("/ws", get(websocket_handler))
        .with_state(state)
}

/// Health check endpoint
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: (if state.game.is_closed() { "stopped" } else { "ok" }).to_string(),
        version: crate::VERSION.to_string(),
        state: state.game.status().state.to_string(),
    })
}

/// Current game output
async fn get_game(State(state): State<Arc<AppState>>) -> Json<GameOutput> {
    Json(state.game.status())
}

async fn dispatch(state: &AppState, command: GameCommand) -> Result<(StatusCode, Json<AcceptedResponse>), StatusCode> {
    state.game.send(command).await.map_err(|e| match e {
        GameError::RunnerStopped => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    })?;
    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            accepted: true,
            command: format!("{:?}", command),
        }),
    ))
}

/// Press the start button
async fn start_game(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<AcceptedResponse>), StatusCode> {
    dispatch(&state, GameCommand::Start).await
}

/// Manual key, same cooldown as the camera
async fn simulate_key(
    State(state): State<Arc<AppState>>,
    Json(req): Json<KeyRequest>,
) -> Result<(StatusCode, Json<AcceptedResponse>), StatusCode> {
    dispatch(&state, GameCommand::SimulateKey { correct: req.correct }).await
}

/// Force the gate open
async fn force_open(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<AcceptedResponse>), StatusCode> {
    dispatch(&state, GameCommand::ForceOpen).await
}

/// Tear the game down
async fn stop_game(State(state): State<Arc<AppState>>) -> (StatusCode, Json<AcceptedResponse>) {
    state.game.stop();
    (
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            accepted: true,
            command: format!("{:?}", GameCommand::Stop),
        }),
    )
}

/// WebSocket handler for live signals
async fn websocket_handler(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let rx = state.signals.subscribe();
    ws.on_upgrade(move |socket| async move {
        handle_websocket(socket, rx).await;
    })
}

/// Handle WebSocket connection
async fn handle_websocket(socket: WebSocket, mut rx: broadcast::Receiver<PresentationSignal>) {
    let (mut sender, mut receiver) = socket.split();
    loop {
        tokio::select! {
            signal = rx.recv() => match signal {
                Ok(signal) => {
                    let json = serde_json::to_string(&signal).unwrap_or_default();
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "websocket client lagging");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

/// Build a runner whose presenter feeds the WebSocket
pub fn spawn_game(
    config: GameConfig,
    source: Arc<dyn CaptureSource>,
    loader: Arc<dyn ClassifierLoader>,
    voice: Arc<dyn VoiceNotifier>,
) -> (GameHandle, broadcast::Sender<PresentationSignal>) {
    let presenter = ChannelPresenter::new(256);
    let signals = presenter.sender();
    let controller = GameController::new(config, Arc::new(presenter), voice);
    let (runner, handle) = GameRunner::new(controller, source, loader);
    runner.spawn();
    (handle, signals)
}

/// Run the API server
pub async fn run_server(
    addr: &str,
    config: GameConfig,
    source: Arc<dyn CaptureSource>,
    loader: Arc<dyn ClassifierLoader>,
    voice: Arc<dyn VoiceNotifier>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (game, signals) = spawn_game(config, source, loader, voice);
    let router = create_router(game.clone(), signals);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "escape gate API listening");
    println!("🚪 Escape Gate API running on {}", addr);
    println!("  GET  /health      - Health check");
    println!("  GET  /game        - Game status");
    println!("  POST /game/start  - Start the game");
    println!("  POST /game/key    - Manual key {{\"correct\": true}}");
    println!("  POST /game/open   - Force the gate open");
    println!("  POST /game/stop   - Stop the game");
    println!("  WS   /ws          - Live presentation signals");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    game.stop();
    Ok(())
}
