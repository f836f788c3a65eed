//! Verification gate: the aggregate precondition in front of the privileged
//! start action.
//!
//! Two policies are in force:
//!
//! * The compatibility step only lets a session reach `Ready` when all seven
//!   checks pass ([`STEP_REQUIRED_CHECKS`]).
//! * The commit-time re-check only requires the three safety-critical checks
//!   ([`COMMIT_REQUIRED_CHECKS`]). Memory and storage are warning-level at
//!   commit.
//!
//! Whether commit should also be strict on memory and storage is pending a
//! product decision; [`COMMIT_REQUIRED_CHECKS`] is the single switch.

use crate::report::{CompatibilityCheck, CompatibilityReport};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Checks the compatibility step's exit condition requires.
pub const STEP_REQUIRED_CHECKS: [CompatibilityCheck; 7] = CompatibilityCheck::ALL;

/// Checks re-verified at commit.
pub const COMMIT_REQUIRED_CHECKS: [CompatibilityCheck; 3] = [
    CompatibilityCheck::GraphicsBackend,
    CompatibilityCheck::InferenceRuntime,
    CompatibilityCheck::GazeRuntime,
];

/// One boolean the gate looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GateCondition {
    CameraVerified,
    ObjectModelLoaded,
    GazeModelLoaded,
    FaceVerified,
    Compatibility(CompatibilityCheck),
}

impl fmt::Display for GateCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CameraVerified => f.write_str("camera verified"),
            Self::ObjectModelLoaded => f.write_str("object detection model loaded"),
            Self::GazeModelLoaded => f.write_str("gaze detection model loaded"),
            Self::FaceVerified => f.write_str("face verified"),
            Self::Compatibility(check) => write!(f, "{}", check.label()),
        }
    }
}

/// The booleans of a session the gate is evaluated over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GateView {
    pub camera_verified: bool,
    pub object_model_loaded: bool,
    pub gaze_model_loaded: bool,
    pub face_verified: bool,
    pub compatibility: Option<CompatibilityReport>,
}

fn missing_with(view: &GateView, checks: &[CompatibilityCheck]) -> Vec<GateCondition> {
    let mut missing = Vec::new();
    if !view.camera_verified {
        missing.push(GateCondition::CameraVerified);
    }
    if !view.object_model_loaded {
        missing.push(GateCondition::ObjectModelLoaded);
    }
    if !view.gaze_model_loaded {
        missing.push(GateCondition::GazeModelLoaded);
    }
    if !view.face_verified {
        missing.push(GateCondition::FaceVerified);
    }
    let report = view.compatibility.unwrap_or_default();
    missing.extend(
        checks
            .iter()
            .filter(|check| !report.get(**check))
            .map(|check| GateCondition::Compatibility(*check)),
    );
    missing
}

/// Conditions missing for the session to be at `Ready` (strict policy).
pub fn missing_for_ready(view: &GateView) -> Vec<GateCondition> {
    missing_with(view, &STEP_REQUIRED_CHECKS)
}

/// Conditions missing for commit (relaxed policy).
pub fn missing_for_commit(view: &GateView) -> Vec<GateCondition> {
    missing_with(view, &COMMIT_REQUIRED_CHECKS)
}

/// Commit gate. `Err` lists every unmet condition.
pub fn commit_gate(view: &GateView) -> Result<(), Vec<GateCondition>> {
    let missing = missing_for_commit(view);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn complete() -> GateView {
        GateView {
            camera_verified: true,
            object_model_loaded: true,
            gaze_model_loaded: true,
            face_verified: true,
            compatibility: Some(CompatibilityReport::all_passing()),
        }
    }

    #[test]
    fn test_complete_session_passes_both_policies() {
        assert!(missing_for_ready(&complete()).is_empty());
        assert!(commit_gate(&complete()).is_ok());
    }

    #[test]
    fn test_commit_relaxes_memory_and_storage() {
        let view = GateView {
            compatibility: Some(CompatibilityReport::from_fn(|c| !c.is_resource_check())),
            ..complete()
        };
        assert!(commit_gate(&view).is_ok());
        assert_eq!(
            missing_for_ready(&view),
            vec![
                GateCondition::Compatibility(CompatibilityCheck::SufficientMemory),
                GateCondition::Compatibility(CompatibilityCheck::SufficientStorage),
            ]
        );
    }

    #[test]
    fn test_no_report_blocks_commit() {
        let view = GateView {
            compatibility: None,
            ..complete()
        };
        assert_eq!(commit_gate(&view).unwrap_err().len(), 3);
    }

    proptest! {
        /// Commit holds iff the four verification booleans and the three
        /// critical checks hold, whatever memory and storage say.
        #[test]
        fn commit_gate_is_conjunction(
            flags in proptest::array::uniform4(any::<bool>()),
            checks in proptest::array::uniform7(any::<bool>()),
        ) {
            let report = CompatibilityReport::from_fn(|c| checks[c as usize]);
            let view = GateView {
                camera_verified: flags[0],
                object_model_loaded: flags[1],
                gaze_model_loaded: flags[2],
                face_verified: flags[3],
                compatibility: Some(report),
            };
            let expected_commit = flags.iter().all(|f| *f)
                && COMMIT_REQUIRED_CHECKS.iter().all(|c| checks[*c as usize]);
            prop_assert_eq!(commit_gate(&view).is_ok(), expected_commit);

            let expected_ready = flags.iter().all(|f| *f) && checks.iter().all(|c| *c);
            prop_assert_eq!(missing_for_ready(&view).is_empty(), expected_ready);
        }
    }
}
