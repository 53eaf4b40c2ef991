//! Voice notifier: tells an external voice assistant about game events
//!
//! The game only ever sends one system message per event. The assistant's
//! call lifecycle and event stream are modelled so a front end can show
//! what the assistant is doing, but nothing here feeds back into the game.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::VoiceConfig;
use crate::types::GameError;

/// Coarse game events the assistant hears about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceEvent {
    KeyCorrect,
    KeyIncorrect,
}

impl VoiceEvent {
    pub fn name(&self) -> &'static str {
        match self {
            VoiceEvent::KeyCorrect => "key_correct",
            VoiceEvent::KeyIncorrect => "key_incorrect",
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Message sent to the assistant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceMessage {
    pub role: Role,
    pub content: String,
}

impl VoiceMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Events the assistant emits
///
/// Speech events are reported by the hosted assistant through its transport
/// and passed on with `relay`; the client only generates call, message and
/// error events itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AssistantEvent {
    CallStart,
    CallEnd,
    SpeechStart,
    SpeechEnd,
    Message { message: VoiceMessage },
    Error { error: String },
}

/// Receives game events; failures never affect the game
#[async_trait]
pub trait VoiceNotifier: Send + Sync {
    async fn notify(&self, event: VoiceEvent) -> Result<(), GameError>;
}

/// Voice disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVoice;

#[async_trait]
impl VoiceNotifier for NoVoice {
    async fn notify(&self, _event: VoiceEvent) -> Result<(), GameError> {
        Ok(())
    }
}

// =============================================================================
// Transports
// =============================================================================

/// Delivers a message to the assistant
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn deliver(&self, config: &VoiceConfig, message: &VoiceMessage) -> Result<(), GameError>;
}

/// Logs messages instead of sending them
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport;

#[async_trait]
impl VoiceTransport for LogTransport {
    async fn deliver(&self, config: &VoiceConfig, message: &VoiceMessage) -> Result<(), GameError> {
        info!(assistant = %config.assistant_id, content = %message.content, "voice message");
        Ok(())
    }
}

/// Request body posted by `WebhookTransport`
#[derive(Debug, Serialize)]
struct WebhookBody<'a> {
    assistant_id: &'a str,
    message: &'a VoiceMessage,
}

/// Posts messages as JSON to an HTTP endpoint
#[derive(Debug, Clone)]
pub struct WebhookTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl WebhookTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl VoiceTransport for WebhookTransport {
    async fn deliver(&self, config: &VoiceConfig, message: &VoiceMessage) -> Result<(), GameError> {
        let body = WebhookBody {
            assistant_id: &config.assistant_id,
            message,
        };
        self.client
            .post(&self.endpoint)
            .bearer_auth(&config.public_key)
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| GameError::VoiceAssistant(e.to_string()))?;
        Ok(())
    }
}

// =============================================================================
// Assistant
// =============================================================================

/// Call lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Idle,
    InCall,
}

/// Voice assistant client
pub struct VoiceAssistant {
    config: VoiceConfig,
    transport: Box<dyn VoiceTransport>,
    status: Mutex<CallStatus>,
    events: broadcast::Sender<AssistantEvent>,
}

impl std::fmt::Debug for VoiceAssistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceAssistant")
            .field("assistant_id", &self.config.assistant_id)
            .field("status", &self.status())
            .finish()
    }
}

impl VoiceAssistant {
    /// Build an assistant, picking the transport from the config
    pub fn new(config: VoiceConfig) -> Result<Self, GameError> {
        let transport: Box<dyn VoiceTransport> = match &config.endpoint {
            Some(endpoint) => Box::new(WebhookTransport::new(endpoint.clone())),
            None => Box::new(LogTransport),
        };
        Self::with_transport(config, transport)
    }

    pub fn with_transport(config: VoiceConfig, transport: Box<dyn VoiceTransport>) -> Result<Self, GameError> {
        if config.public_key.trim().is_empty() {
            return Err(GameError::Config("voice public_key is empty".to_string()));
        }
        if config.assistant_id.trim().is_empty() {
            return Err(GameError::Config("voice assistant_id is empty".to_string()));
        }
        let (events, _) = broadcast::channel(64);
        Ok(Self {
            config,
            transport,
            status: Mutex::new(CallStatus::Idle),
            events,
        })
    }

    pub fn status(&self) -> CallStatus {
        self.status.lock().map(|s| *s).unwrap_or(CallStatus::Idle)
    }

    /// Subscribe to assistant events
    pub fn subscribe(&self) -> broadcast::Receiver<AssistantEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: AssistantEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Pass on an event reported by the remote assistant
    pub fn relay(&self, event: AssistantEvent) {
        debug!(?event, "assistant event");
        self.emit(event);
    }

    /// Log every assistant event until the assistant is dropped
    pub fn spawn_event_log(&self) -> JoinHandle<()> {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(AssistantEvent::Error { error }) => warn!(%error, "assistant error"),
                    Ok(event) => info!(?event, "assistant event"),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "assistant event log lagging");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn set_status(&self, status: CallStatus) -> Result<CallStatus, GameError> {
        let mut current = self
            .status
            .lock()
            .map_err(|_| GameError::VoiceAssistant("call state poisoned".to_string()))?;
        let previous = *current;
        *current = status;
        Ok(previous)
    }

    /// Start a call; no-op when already in one
    pub fn start_call(&self) -> Result<(), GameError> {
        if self.set_status(CallStatus::InCall)? == CallStatus::Idle {
            info!(assistant = %self.config.assistant_id, "voice call started");
            self.emit(AssistantEvent::CallStart);
        }
        Ok(())
    }

    /// End a call; no-op when idle
    pub fn end_call(&self) -> Result<(), GameError> {
        if self.set_status(CallStatus::Idle)? == CallStatus::InCall {
            info!("voice call ended");
            self.emit(AssistantEvent::CallEnd);
        }
        Ok(())
    }

    /// Send one message, starting a call if needed
    pub async fn send_message(&self, message: VoiceMessage) -> Result<(), GameError> {
        self.start_call()?;
        debug!(content = %message.content, "sending voice message");
        match self.transport.deliver(&self.config, &message).await {
            Ok(()) => {
                self.emit(AssistantEvent::Message { message });
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "voice message failed");
                self.emit(AssistantEvent::Error { error: e.to_string() });
                Err(e)
            }
        }
    }
}

#[async_trait]
impl VoiceNotifier for VoiceAssistant {
    async fn notify(&self, event: VoiceEvent) -> Result<(), GameError> {
        self.send_message(VoiceMessage::system(event.name())).await
    }
}
