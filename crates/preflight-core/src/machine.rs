//! Step semantics: entry guards, side effects and exit conditions.
//!
//! Pure functions over [`SessionState`]. The session actor decides when an
//! effect runs and with which timeout; this module decides what it means.

use crate::capability::{CameraStream, ModelHandle, ModelKind, VerificationOutcome};
use crate::error::{CameraError, ModelError, StepError};
use crate::gate::{commit_gate, STEP_REQUIRED_CHECKS};
use crate::probe::CompatibilityRun;
use crate::resources::{CameraLease, Resource};
use crate::session::SessionState;
use crate::step::ReadinessStep;
use std::collections::BTreeSet;
use std::sync::Arc;

/// What advancing the current step requires.
pub(crate) enum Plan {
    /// Decided without waiting on a collaborator.
    Settled(Result<(), StepError>),
    Suspend(Effect),
}

/// A side effect whose outcome is fed back through [`settle`].
pub(crate) enum Effect {
    AcquireCamera,
    LoadModel(ModelKind),
    VerifyFace(Arc<dyn CameraStream>),
    CheckCompatibility,
}

pub(crate) enum Outcome {
    Camera(Result<CameraLease, CameraError>),
    Model(ModelKind, Result<ModelHandle, ModelError>),
    /// Capture and transport failures are already mapped to step errors.
    Face(Result<VerificationOutcome, StepError>),
    Compatibility(CompatibilityRun),
}

fn model_resource(kind: ModelKind) -> Resource {
    match kind {
        ModelKind::ObjectDetection => Resource::ObjectModel,
        ModelKind::Gaze => Resource::GazeModel,
    }
}

/// Every resource produced by an earlier step must still be held.
pub(crate) fn entry_guard(state: &SessionState) -> Result<(), StepError> {
    let missing: Vec<Resource> = state
        .step
        .prerequisites()
        .filter(|resource| !state.holds(*resource))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(StepError::PreconditionFailed {
            step: state.step,
            missing,
        })
    }
}

/// Decide what advancing from the current step takes.
pub(crate) fn plan(state: &mut SessionState) -> Plan {
    if let Err(e) = entry_guard(state) {
        return Plan::Settled(Err(e));
    }

    match state.step {
        ReadinessStep::Details | ReadinessStep::Ready => Plan::Settled(Ok(())),
        ReadinessStep::CameraPermission => {
            if state.camera.is_some() {
                Plan::Settled(Ok(()))
            } else {
                Plan::Suspend(Effect::AcquireCamera)
            }
        }
        ReadinessStep::ObjectModelLoad => {
            if state.object_model.is_some() {
                Plan::Settled(Ok(()))
            } else {
                Plan::Suspend(Effect::LoadModel(ModelKind::ObjectDetection))
            }
        }
        ReadinessStep::GazeModelLoad => {
            if state.gaze_model.is_some() {
                Plan::Settled(Ok(()))
            } else {
                Plan::Suspend(Effect::LoadModel(ModelKind::Gaze))
            }
        }
        ReadinessStep::CameraVerify => {
            state.camera_verified = state.camera.as_ref().is_some_and(|lease| lease.is_live());
            Plan::Settled(exit_condition(state))
        }
        ReadinessStep::FaceVerify => {
            state.face_verified = false;
            match state.camera.as_ref() {
                Some(lease) if lease.is_live() => Plan::Suspend(Effect::VerifyFace(lease.stream())),
                _ => Plan::Settled(Err(StepError::CameraUnavailable)),
            }
        }
        ReadinessStep::CompatibilityCheck => Plan::Suspend(Effect::CheckCompatibility),
    }
}

/// Apply an effect's outcome, then evaluate the exit condition.
pub(crate) fn settle(state: &mut SessionState, outcome: Outcome) -> Result<(), StepError> {
    match outcome {
        Outcome::Camera(Ok(lease)) => {
            state.camera = Some(lease);
        }
        Outcome::Camera(Err(CameraError::PermissionDenied(reason))) => {
            return Err(StepError::PermissionDenied(reason));
        }
        Outcome::Camera(Err(e)) => {
            return Err(StepError::AcquisitionFailed {
                resource: Resource::CameraStream,
                reason: e.to_string(),
            });
        }
        Outcome::Model(kind, Ok(handle)) => match kind {
            ModelKind::ObjectDetection => state.object_model = Some(handle),
            ModelKind::Gaze => state.gaze_model = Some(handle),
        },
        Outcome::Model(kind, Err(e)) => {
            return Err(StepError::AcquisitionFailed {
                resource: model_resource(kind),
                reason: e.to_string(),
            });
        }
        Outcome::Face(Ok(verdict)) => {
            if !verdict.success {
                return Err(StepError::RemoteVerificationFailed(verdict.failure_reason()));
            }
            state.face_verified = true;
        }
        Outcome::Face(Err(e)) => return Err(e),
        Outcome::Compatibility(run) => {
            state.compatibility = Some(run.report);
        }
    }
    exit_condition(state)
}

/// The condition under which the current step may be left forward.
pub(crate) fn exit_condition(state: &SessionState) -> Result<(), StepError> {
    match state.step {
        ReadinessStep::Details | ReadinessStep::Ready => Ok(()),
        ReadinessStep::CameraPermission => match &state.camera {
            Some(_) => Ok(()),
            None => Err(StepError::CameraUnavailable),
        },
        ReadinessStep::ObjectModelLoad | ReadinessStep::GazeModelLoad => {
            let kind = if state.step == ReadinessStep::ObjectModelLoad {
                ModelKind::ObjectDetection
            } else {
                ModelKind::Gaze
            };
            if state.holds(model_resource(kind)) {
                Ok(())
            } else {
                Err(StepError::AcquisitionFailed {
                    resource: model_resource(kind),
                    reason: format!("{} is not loaded", kind),
                })
            }
        }
        ReadinessStep::CameraVerify => {
            if state.camera_verified {
                Ok(())
            } else {
                Err(StepError::CameraUnavailable)
            }
        }
        ReadinessStep::FaceVerify => {
            if state.face_verified {
                Ok(())
            } else {
                Err(StepError::RemoteVerificationFailed(
                    VerificationOutcome::default().failure_reason(),
                ))
            }
        }
        ReadinessStep::CompatibilityCheck => {
            let report = state.compatibility.unwrap_or_default();
            let failing: BTreeSet<_> = STEP_REQUIRED_CHECKS
                .into_iter()
                .filter(|check| !report.get(*check))
                .collect();
            if failing.is_empty() {
                Ok(())
            } else {
                Err(StepError::CompatibilityFailed {
                    resource_warning: failing.iter().any(|check| check.is_resource_check()),
                    failing,
                })
            }
        }
    }
}

/// Conditions checked once more right before the privileged start action.
pub(crate) fn check_commit(state: &SessionState) -> Result<(), StepError> {
    if state.step != ReadinessStep::Ready {
        return Err(StepError::NotReady { step: state.step });
    }
    commit_gate(&state.gate_view()).map_err(|missing| StepError::SessionStale { missing })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{CompatibilityCheck, CompatibilityReport};
    use crate::schedule::AssessmentRef;
    use crate::testing::FakeStream;

    fn state_at(step: ReadinessStep) -> SessionState {
        let mut state = SessionState::new(
            "s-1",
            AssessmentRef {
                job_id: "job-1".into(),
                title: "Backend Engineer".into(),
            },
        );
        state.step = step;
        state
    }

    fn handle(kind: ModelKind) -> ModelHandle {
        ModelHandle {
            kind,
            name: kind.to_string(),
            source: "memory".into(),
            size_bytes: 1,
        }
    }

    fn fill_until(state: &mut SessionState, step: ReadinessStep) {
        for resource in step.prerequisites() {
            match resource {
                Resource::CameraStream => {
                    state.camera = Some(CameraLease::new(Box::new(FakeStream::new("cam-0"))))
                }
                Resource::ObjectModel => state.object_model = Some(handle(ModelKind::ObjectDetection)),
                Resource::GazeModel => state.gaze_model = Some(handle(ModelKind::Gaze)),
                Resource::CameraVerification => state.camera_verified = true,
                Resource::FaceVerification => state.face_verified = true,
                Resource::CompatibilityReport => {
                    state.compatibility = Some(CompatibilityReport::all_passing())
                }
            }
        }
    }

    #[test]
    fn test_entry_guard_lists_missing_resources() {
        let mut state = state_at(ReadinessStep::FaceVerify);
        state.object_model = Some(handle(ModelKind::ObjectDetection));
        let err = entry_guard(&state).unwrap_err();
        assert_eq!(
            err,
            StepError::PreconditionFailed {
                step: ReadinessStep::FaceVerify,
                missing: vec![
                    Resource::CameraStream,
                    Resource::GazeModel,
                    Resource::CameraVerification
                ],
            }
        );
    }

    #[test]
    fn test_plan_skips_held_resources() {
        let mut state = state_at(ReadinessStep::CameraPermission);
        assert!(matches!(plan(&mut state), Plan::Suspend(Effect::AcquireCamera)));

        fill_until(&mut state, ReadinessStep::ObjectModelLoad);
        assert!(matches!(plan(&mut state), Plan::Settled(Ok(()))));

        let mut state = state_at(ReadinessStep::GazeModelLoad);
        fill_until(&mut state, ReadinessStep::GazeModelLoad);
        state.gaze_model = Some(handle(ModelKind::Gaze));
        assert!(matches!(plan(&mut state), Plan::Settled(Ok(()))));
    }

    #[test]
    fn test_camera_verify_requires_live_stream() {
        let mut state = state_at(ReadinessStep::CameraVerify);
        fill_until(&mut state, ReadinessStep::CameraVerify);
        assert!(matches!(plan(&mut state), Plan::Settled(Ok(()))));
        assert!(state.camera_verified);

        if let Some(lease) = &state.camera {
            lease.stream().stop();
        }
        assert!(matches!(
            plan(&mut state),
            Plan::Settled(Err(StepError::CameraUnavailable))
        ));
        assert!(!state.camera_verified);
    }

    #[test]
    fn test_face_rejection_keeps_reason() {
        let mut state = state_at(ReadinessStep::FaceVerify);
        fill_until(&mut state, ReadinessStep::FaceVerify);
        assert!(matches!(plan(&mut state), Plan::Suspend(Effect::VerifyFace(_))));

        let rejected = VerificationOutcome {
            success: false,
            error: Some("Face does not match the registered profile.".into()),
            ..VerificationOutcome::default()
        };
        assert_eq!(
            settle(&mut state, Outcome::Face(Ok(rejected))),
            Err(StepError::RemoteVerificationFailed(
                "Face does not match the registered profile.".into()
            ))
        );
        assert!(!state.face_verified);

        assert!(settle(&mut state, Outcome::Face(Ok(VerificationOutcome::verified()))).is_ok());
        assert!(state.face_verified);
    }

    #[test]
    fn test_camera_errors_map_to_step_errors() {
        let mut state = state_at(ReadinessStep::CameraPermission);
        assert_eq!(
            settle(
                &mut state,
                Outcome::Camera(Err(CameraError::PermissionDenied("blocked".into())))
            ),
            Err(StepError::PermissionDenied("blocked".into()))
        );
        assert!(matches!(
            settle(&mut state, Outcome::Camera(Err(CameraError::NoDevice))),
            Err(StepError::AcquisitionFailed {
                resource: Resource::CameraStream,
                ..
            })
        ));
    }

    #[test]
    fn test_compatibility_report_kept_on_failure() {
        let mut state = state_at(ReadinessStep::CompatibilityCheck);
        fill_until(&mut state, ReadinessStep::CompatibilityCheck);
        let report = CompatibilityReport::from_fn(|c| c != CompatibilityCheck::SufficientMemory);
        let run = CompatibilityRun {
            report,
            outcomes: vec![],
        };

        let err = settle(&mut state, Outcome::Compatibility(run)).unwrap_err();
        assert_eq!(
            err,
            StepError::CompatibilityFailed {
                failing: [CompatibilityCheck::SufficientMemory].into_iter().collect(),
                resource_warning: true,
            }
        );
        assert_eq!(state.compatibility, Some(report));
    }

    #[test]
    fn test_commit_check() {
        let mut state = state_at(ReadinessStep::CompatibilityCheck);
        assert!(matches!(
            check_commit(&state),
            Err(StepError::NotReady { .. })
        ));

        state.step = ReadinessStep::Ready;
        fill_until(&mut state, ReadinessStep::Ready);
        assert!(check_commit(&state).is_ok());

        state.face_verified = false;
        assert!(matches!(
            check_commit(&state),
            Err(StepError::SessionStale { .. })
        ));
    }
}
