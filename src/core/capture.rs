//! Capture source: the camera feed behind a trait
//!
//! The game only needs three things from a camera: a permission-gated
//! request, a stream of frames, and a way to release the device.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::CaptureConfig;
use crate::types::GameError;

/// Parameters for a camera request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    pub facing_mode: String,
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub mirrored: bool,
}

impl From<&CaptureConfig> for CaptureRequest {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            facing_mode: config.facing_mode.clone(),
            ideal_width: config.ideal_width,
            ideal_height: config.ideal_height,
            mirrored: config.mirrored,
        }
    }
}

/// One video frame
#[derive(Debug, Clone)]
pub struct Frame {
    /// Monotonic frame number within a stream
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub mirrored: bool,
    pub captured_at: DateTime<Utc>,
    /// Raw RGBA pixels; may be empty for synthetic sources
    pub pixels: Vec<u8>,
}

/// Something that can hand out a camera stream
#[async_trait]
pub trait CaptureSource: Send + Sync {
    /// Ask for the camera; fails with `PermissionDenied` or `DeviceUnavailable`
    async fn request(&self, request: &CaptureRequest) -> Result<Box<dyn CaptureStream>, GameError>;
}

/// A live camera stream
#[async_trait]
pub trait CaptureStream: Send {
    /// Pull the current frame
    async fn next_frame(&mut self) -> Result<Frame, GameError>;

    /// Release the device; later frames fail
    fn stop(&mut self);

    fn is_live(&self) -> bool;
}

/// How a synthetic camera answers requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticMode {
    Grant,
    Deny,
    NoDevice,
}

/// Camera stand-in producing blank frames at the requested resolution
#[derive(Debug, Clone)]
pub struct SyntheticCapture {
    mode: SyntheticMode,
}

impl SyntheticCapture {
    pub fn granting() -> Self {
        Self { mode: SyntheticMode::Grant }
    }

    pub fn denying() -> Self {
        Self { mode: SyntheticMode::Deny }
    }

    pub fn without_device() -> Self {
        Self { mode: SyntheticMode::NoDevice }
    }
}

#[async_trait]
impl CaptureSource for SyntheticCapture {
    async fn request(&self, request: &CaptureRequest) -> Result<Box<dyn CaptureStream>, GameError> {
        match self.mode {
            SyntheticMode::Grant => {
                info!(
                    facing = %request.facing_mode,
                    width = request.ideal_width,
                    height = request.ideal_height,
                    "synthetic camera granted"
                );
                Ok(Box::new(SyntheticStream {
                    width: request.ideal_width,
                    height: request.ideal_height,
                    mirrored: request.mirrored,
                    sequence: 0,
                    live: true,
                }))
            }
            SyntheticMode::Deny => Err(GameError::PermissionDenied("user refused camera access".to_string())),
            SyntheticMode::NoDevice => Err(GameError::DeviceUnavailable("no camera found".to_string())),
        }
    }
}

/// Stream handed out by `SyntheticCapture`
#[derive(Debug)]
pub struct SyntheticStream {
    width: u32,
    height: u32,
    mirrored: bool,
    sequence: u64,
    live: bool,
}

#[async_trait]
impl CaptureStream for SyntheticStream {
    async fn next_frame(&mut self) -> Result<Frame, GameError> {
        if !self.live {
            return Err(GameError::DeviceUnavailable("stream stopped".to_string()));
        }
        self.sequence += 1;
        Ok(Frame {
            sequence: self.sequence,
            width: self.width,
            height: self.height,
            mirrored: self.mirrored,
            captured_at: Utc::now(),
            pixels: Vec::new(),
        })
    }

    fn stop(&mut self) {
        if self.live {
            debug!(frames = self.sequence, "synthetic stream stopped");
        }
        self.live = false;
    }

    fn is_live(&self) -> bool {
        self.live
    }
}
