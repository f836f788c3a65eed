//! Collaborator seams: camera hardware, model loading and remote services.
//!
//! The platform crate provides the real implementations; tests use scripted
//! fakes. Everything here is object-safe and shared as `Arc<dyn _>`.

use crate::error::{CameraError, ModelError, RemoteError};
use crate::probe::CompatibilityProbe;
use crate::schedule::{Assessment, AssessmentRef};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A still image captured from a live stream, JPEG encoded.
#[derive(Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub jpeg: Vec<u8>,
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("jpeg_len", &self.jpeg.len())
            .finish()
    }
}

/// Camera hardware: hands out at most one stream per call.
#[async_trait]
pub trait Camera: Send + Sync {
    /// Request access and open a stream.
    async fn acquire(&self) -> Result<Box<dyn CameraStream>, CameraError>;
}

/// A live camera stream. `stop` must be idempotent.
#[async_trait]
pub trait CameraStream: Send + Sync {
    fn id(&self) -> &str;

    fn is_live(&self) -> bool;

    async fn capture_frame(&self) -> Result<Frame, CameraError>;

    fn stop(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModelKind {
    ObjectDetection,
    Gaze,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ObjectDetection => f.write_str("object detection model"),
            Self::Gaze => f.write_str("gaze detection model"),
        }
    }
}

/// Handle to a loaded detection model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelHandle {
    pub kind: ModelKind,
    pub name: String,
    /// Where the model was resolved from (path or URL).
    pub source: String,
    pub size_bytes: u64,
}

#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self, kind: ModelKind) -> Result<ModelHandle, ModelError>;
}

/// Response of the identity-verification service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    /// Informational message, e.g. pending manual review.
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub similarity: Option<f64>,
}

impl VerificationOutcome {
    pub fn verified() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// Reason to show when `success` is false.
    pub fn failure_reason(&self) -> String {
        self.error
            .clone()
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "Face verification failed.".to_string())
    }
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Submit one still image. Transport failures are `Err`; a rejected face
    /// is `Ok` with `success == false`.
    async fn verify(&self, frame: &Frame) -> Result<VerificationOutcome, RemoteError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttemptId(pub String);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
pub trait AttemptStarter: Send + Sync {
    async fn start_attempt(&self, assessment: &AssessmentRef) -> Result<AttemptId, RemoteError>;
}

/// Assessment eligibility/schedule service.
#[async_trait]
pub trait AssessmentDirectory: Send + Sync {
    async fn assessment(&self, job_id: &str) -> Result<Assessment, RemoteError>;
}

/// Everything a session needs to run its side effects.
#[derive(Clone)]
pub struct Collaborators {
    pub camera: Arc<dyn Camera>,
    pub models: Arc<dyn ModelLoader>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub attempts: Arc<dyn AttemptStarter>,
    pub compatibility: Arc<CompatibilityProbe>,
}
