//! Resources held by a session and the scoped camera lease.

use crate::capability::CameraStream;
use crate::step::ReadinessStep;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Anything a step leaves behind that a later step relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Resource {
    CameraStream,
    ObjectModel,
    GazeModel,
    CameraVerification,
    FaceVerification,
    CompatibilityReport,
}

impl Resource {
    pub const ALL: [Resource; 6] = [
        Self::CameraStream,
        Self::ObjectModel,
        Self::GazeModel,
        Self::CameraVerification,
        Self::FaceVerification,
        Self::CompatibilityReport,
    ];

    /// The step whose successful advance produces this resource.
    pub fn acquired_at(self) -> ReadinessStep {
        match self {
            Self::CameraStream => ReadinessStep::CameraPermission,
            Self::ObjectModel => ReadinessStep::ObjectModelLoad,
            Self::GazeModel => ReadinessStep::GazeModelLoad,
            Self::CameraVerification => ReadinessStep::CameraVerify,
            Self::FaceVerification => ReadinessStep::FaceVerify,
            Self::CompatibilityReport => ReadinessStep::CompatibilityCheck,
        }
    }

    /// Resources invalidated when the session steps back to `step`.
    pub fn invalidated_by_reentry(step: ReadinessStep) -> impl Iterator<Item = Resource> {
        Self::ALL
            .into_iter()
            .filter(move |resource| resource.acquired_at() >= step)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CameraStream => "camera stream",
            Self::ObjectModel => "object detection model",
            Self::GazeModel => "gaze detection model",
            Self::CameraVerification => "camera verification",
            Self::FaceVerification => "face verification",
            Self::CompatibilityReport => "compatibility report",
        };
        f.write_str(name)
    }
}

/// Sole owner of a live camera stream. The stream is stopped when the lease
/// is released or dropped, whichever comes first.
pub struct CameraLease {
    stream: Arc<dyn CameraStream>,
}

impl CameraLease {
    pub fn new(stream: Box<dyn CameraStream>) -> Self {
        Self {
            stream: Arc::from(stream),
        }
    }

    pub fn id(&self) -> &str {
        self.stream.id()
    }

    pub fn is_live(&self) -> bool {
        self.stream.is_live()
    }

    /// Borrow the stream for a capture that outlives this call.
    pub fn stream(&self) -> Arc<dyn CameraStream> {
        Arc::clone(&self.stream)
    }

    /// Stop the stream now.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for CameraLease {
    fn drop(&mut self) {
        debug!(stream = self.stream.id(), "stopping camera stream");
        self.stream.stop();
    }
}

impl fmt::Debug for CameraLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraLease")
            .field("stream", &self.stream.id())
            .field("live", &self.stream.is_live())
            .finish()
    }
}
