//! Compatibility report produced by the aggregate compatibility probe.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One of the seven environment checks run at the compatibility step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CompatibilityCheck {
    GraphicsBackend,
    InferenceRuntime,
    GazeRuntime,
    CameraPresent,
    LibrariesPresent,
    SufficientMemory,
    SufficientStorage,
}

impl CompatibilityCheck {
    pub const ALL: [CompatibilityCheck; 7] = [
        Self::GraphicsBackend,
        Self::InferenceRuntime,
        Self::GazeRuntime,
        Self::CameraPresent,
        Self::LibrariesPresent,
        Self::SufficientMemory,
        Self::SufficientStorage,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::GraphicsBackend => "Graphics acceleration",
            Self::InferenceRuntime => "Inference runtime",
            Self::GazeRuntime => "Gaze runtime",
            Self::CameraPresent => "Camera",
            Self::LibrariesPresent => "Libraries",
            Self::SufficientMemory => "Sufficient memory",
            Self::SufficientStorage => "Sufficient storage",
        }
    }

    /// Memory and storage shortfalls are surfaced as a resource warning.
    pub fn is_resource_check(self) -> bool {
        matches!(self, Self::SufficientMemory | Self::SufficientStorage)
    }
}

impl fmt::Display for CompatibilityCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Immutable snapshot of the seven checks. Only built whole, never patched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityReport {
    graphics_backend: bool,
    inference_runtime: bool,
    gaze_runtime: bool,
    camera_present: bool,
    libraries_present: bool,
    sufficient_memory: bool,
    sufficient_storage: bool,
}

impl CompatibilityReport {
    /// Builds a report by asking `passed` for every check.
    pub fn from_fn(mut passed: impl FnMut(CompatibilityCheck) -> bool) -> Self {
        Self {
            graphics_backend: passed(CompatibilityCheck::GraphicsBackend),
            inference_runtime: passed(CompatibilityCheck::InferenceRuntime),
            gaze_runtime: passed(CompatibilityCheck::GazeRuntime),
            camera_present: passed(CompatibilityCheck::CameraPresent),
            libraries_present: passed(CompatibilityCheck::LibrariesPresent),
            sufficient_memory: passed(CompatibilityCheck::SufficientMemory),
            sufficient_storage: passed(CompatibilityCheck::SufficientStorage),
        }
    }

    pub fn all_passing() -> Self {
        Self::from_fn(|_| true)
    }

    pub fn get(&self, check: CompatibilityCheck) -> bool {
        match check {
            CompatibilityCheck::GraphicsBackend => self.graphics_backend,
            CompatibilityCheck::InferenceRuntime => self.inference_runtime,
            CompatibilityCheck::GazeRuntime => self.gaze_runtime,
            CompatibilityCheck::CameraPresent => self.camera_present,
            CompatibilityCheck::LibrariesPresent => self.libraries_present,
            CompatibilityCheck::SufficientMemory => self.sufficient_memory,
            CompatibilityCheck::SufficientStorage => self.sufficient_storage,
        }
    }

    pub fn failing(&self) -> BTreeSet<CompatibilityCheck> {
        CompatibilityCheck::ALL
            .into_iter()
            .filter(|check| !self.get(*check))
            .collect()
    }

    pub fn all_passed(&self) -> bool {
        CompatibilityCheck::ALL.into_iter().all(|check| self.get(check))
    }

    /// True when memory or storage is insufficient.
    pub fn resource_warning(&self) -> bool {
        CompatibilityCheck::ALL
            .into_iter()
            .any(|check| check.is_resource_check() && !self.get(check))
    }
}

/// Comma-separated labels in canonical order.
pub fn describe_checks<'a>(checks: impl IntoIterator<Item = &'a CompatibilityCheck>) -> String {
    checks
        .into_iter()
        .map(|check| check.label())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failing_lists_each_check() {
        let report = CompatibilityReport::from_fn(|check| check.is_resource_check());
        let failing = report.failing();
        assert_eq!(failing.len(), 5);
        assert!(!failing.contains(&CompatibilityCheck::SufficientMemory));
        assert!(!report.all_passed());
        assert!(!report.resource_warning());
    }

    #[test]
    fn test_resource_warning() {
        let report = CompatibilityReport::from_fn(|check| check != CompatibilityCheck::SufficientStorage);
        assert!(report.resource_warning());
        assert_eq!(
            describe_checks(&report.failing()),
            "Sufficient storage"
        );
        assert!(CompatibilityReport::all_passing().all_passed());
        assert!(CompatibilityReport::default().failing().len() == 7);
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_value(CompatibilityReport::all_passing()).unwrap();
        assert_eq!(json["graphicsBackend"], true);
        assert_eq!(json["sufficientStorage"], true);
    }
}
