//! Readiness steps: the linear sequence a candidate walks before an attempt.

use crate::resources::Resource;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One stage of the readiness sequence. Order is significant: `Ord` follows
/// the order in which steps are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReadinessStep {
    /// Informational; nothing to acquire.
    Details,
    CameraPermission,
    ObjectModelLoad,
    GazeModelLoad,
    CameraVerify,
    FaceVerify,
    CompatibilityCheck,
    /// Terminal. Only `commit` or `cancel` leave it.
    Ready,
}

impl Default for ReadinessStep {
    fn default() -> Self {
        Self::Details
    }
}

impl ReadinessStep {
    pub const ALL: [ReadinessStep; 8] = [
        Self::Details,
        Self::CameraPermission,
        Self::ObjectModelLoad,
        Self::GazeModelLoad,
        Self::CameraVerify,
        Self::FaceVerify,
        Self::CompatibilityCheck,
        Self::Ready,
    ];

    /// 1-based position, as shown in the step indicator.
    pub fn number(self) -> usize {
        self as usize + 1
    }

    pub fn next(self) -> Option<Self> {
        Self::ALL.get(self as usize + 1).copied()
    }

    pub fn previous(self) -> Option<Self> {
        (self as usize).checked_sub(1).map(|i| Self::ALL[i])
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Ready
    }

    /// Display title for the step header.
    pub fn title(self) -> &'static str {
        match self {
            Self::Details => "Assessment Details",
            Self::CameraPermission => "Camera Permission",
            Self::ObjectModelLoad => "Load Object Detection Model",
            Self::GazeModelLoad => "Load Gaze Detection Model",
            Self::CameraVerify => "Camera Verification",
            Self::FaceVerify => "Face Verification",
            Self::CompatibilityCheck => "Browser Compatibility",
            Self::Ready => "Start Assessment",
        }
    }

    /// The resource a successful advance out of this step leaves held.
    pub fn acquires(self) -> Option<Resource> {
        match self {
            Self::Details | Self::Ready => None,
            Self::CameraPermission => Some(Resource::CameraStream),
            Self::ObjectModelLoad => Some(Resource::ObjectModel),
            Self::GazeModelLoad => Some(Resource::GazeModel),
            Self::CameraVerify => Some(Resource::CameraVerification),
            Self::FaceVerify => Some(Resource::FaceVerification),
            Self::CompatibilityCheck => Some(Resource::CompatibilityReport),
        }
    }

    /// Resources that must already be held when this step is entered.
    pub fn prerequisites(self) -> impl Iterator<Item = Resource> {
        Self::ALL
            .into_iter()
            .take(self as usize)
            .filter_map(|step| step.acquires())
    }
}

impl fmt::Display for ReadinessStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}
