//! Per-session state and the read-only snapshot handed to the UI.

use crate::capability::ModelHandle;
use crate::gate::GateView;
use crate::report::CompatibilityReport;
use crate::resources::{CameraLease, Resource};
use crate::schedule::AssessmentRef;
use crate::step::ReadinessStep;
use serde::{Deserialize, Serialize};

/// Which step, which resources held. Owned by exactly one session actor.
#[derive(Debug)]
pub struct SessionState {
    pub(crate) id: String,
    pub(crate) assessment: AssessmentRef,
    pub(crate) step: ReadinessStep,
    pub(crate) camera: Option<CameraLease>,
    pub(crate) object_model: Option<ModelHandle>,
    pub(crate) gaze_model: Option<ModelHandle>,
    pub(crate) camera_verified: bool,
    pub(crate) face_verified: bool,
    pub(crate) compatibility: Option<CompatibilityReport>,
    pub(crate) last_error: Option<String>,
}

impl SessionState {
    pub fn new(id: impl Into<String>, assessment: AssessmentRef) -> Self {
        Self {
            id: id.into(),
            assessment,
            step: ReadinessStep::Details,
            camera: None,
            object_model: None,
            gaze_model: None,
            camera_verified: false,
            face_verified: false,
            compatibility: None,
            last_error: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn step(&self) -> ReadinessStep {
        self.step
    }

    pub fn holds(&self, resource: Resource) -> bool {
        match resource {
            Resource::CameraStream => self.camera.is_some(),
            Resource::ObjectModel => self.object_model.is_some(),
            Resource::GazeModel => self.gaze_model.is_some(),
            Resource::CameraVerification => self.camera_verified,
            Resource::FaceVerification => self.face_verified,
            Resource::CompatibilityReport => self.compatibility.is_some(),
        }
    }

    /// Drop one resource. Returns whether it was held.
    pub(crate) fn release(&mut self, resource: Resource) -> bool {
        match resource {
            Resource::CameraStream => match self.camera.take() {
                Some(lease) => {
                    lease.release();
                    true
                }
                None => false,
            },
            Resource::ObjectModel => self.object_model.take().is_some(),
            Resource::GazeModel => self.gaze_model.take().is_some(),
            Resource::CameraVerification => std::mem::take(&mut self.camera_verified),
            Resource::FaceVerification => std::mem::take(&mut self.face_verified),
            Resource::CompatibilityReport => self.compatibility.take().is_some(),
        }
    }

    /// Release everything a re-run of `step` would acquire again.
    pub(crate) fn release_from(&mut self, step: ReadinessStep) -> Vec<Resource> {
        Resource::invalidated_by_reentry(step)
            .filter(|resource| self.release(*resource))
            .collect()
    }

    pub(crate) fn release_all(&mut self) -> Vec<Resource> {
        self.release_from(ReadinessStep::Details)
    }

    pub fn gate_view(&self) -> GateView {
        GateView {
            camera_verified: self.camera_verified,
            object_model_loaded: self.object_model.is_some(),
            gaze_model_loaded: self.gaze_model.is_some(),
            face_verified: self.face_verified,
            compatibility: self.compatibility,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.clone(),
            assessment: self.assessment.clone(),
            step: self.step,
            step_number: self.step.number(),
            step_title: self.step.title().to_string(),
            camera_live: self.camera.as_ref().is_some_and(|lease| lease.is_live()),
            object_model_loaded: self.object_model.is_some(),
            gaze_model_loaded: self.gaze_model.is_some(),
            camera_verified: self.camera_verified,
            face_verified: self.face_verified,
            compatibility: self.compatibility,
            in_progress: false,
            error: self.last_error.clone(),
        }
    }
}

/// Plain-data view of a session. Carries no resource handles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    pub assessment: AssessmentRef,
    pub step: ReadinessStep,
    pub step_number: usize,
    pub step_title: String,
    pub camera_live: bool,
    pub object_model_loaded: bool,
    pub gaze_model_loaded: bool,
    pub camera_verified: bool,
    pub face_verified: bool,
    pub compatibility: Option<CompatibilityReport>,
    /// A side effect of the current step is in flight.
    pub in_progress: bool,
    /// Error of the current step, if its last attempt failed.
    pub error: Option<String>,
}
