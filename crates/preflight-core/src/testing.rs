//! Scripted collaborators shared by the unit tests.

use crate::capability::{
    AssessmentDirectory, AttemptId, AttemptStarter, Camera, CameraStream, Collaborators, Frame,
    IdentityVerifier, ModelHandle, ModelKind, ModelLoader, VerificationOutcome,
};
use crate::error::{CameraError, ModelError, ProbeError, RemoteError};
use crate::probe::{CompatibilityProbe, Probe, ProbeResult};
use crate::report::CompatibilityCheck;
use crate::schedule::{Assessment, AssessmentRef};
use crate::step::ReadinessStep;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Behave {
    Pass,
    Fail,
    Hang,
}

/// Streams opened and still live, across every fake camera of a rig.
#[derive(Debug, Default)]
pub(crate) struct Tally {
    opened: AtomicUsize,
    live: AtomicUsize,
}

impl Tally {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

pub(crate) struct FakeStream {
    id: String,
    live: AtomicBool,
    tally: Option<Arc<Tally>>,
}

impl FakeStream {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            live: AtomicBool::new(true),
            tally: None,
        }
    }

    fn counted(id: String, tally: Arc<Tally>) -> Self {
        tally.opened.fetch_add(1, Ordering::SeqCst);
        tally.live.fetch_add(1, Ordering::SeqCst);
        Self {
            id,
            live: AtomicBool::new(true),
            tally: Some(tally),
        }
    }
}

#[async_trait]
impl CameraStream for FakeStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    async fn capture_frame(&self) -> Result<Frame, CameraError> {
        if !self.is_live() {
            return Err(CameraError::NotLive);
        }
        Ok(Frame {
            width: 1,
            height: 1,
            jpeg: vec![0xFF, 0xD8, 0xFF, 0xD9],
        })
    }

    fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            if let Some(tally) = &self.tally {
                tally.live.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        self.stop();
    }
}

pub(crate) struct FakeCamera {
    tally: Arc<Tally>,
    behave: Behave,
    calls: AtomicUsize,
}

impl FakeCamera {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Camera for FakeCamera {
    async fn acquire(&self) -> Result<Box<dyn CameraStream>, CameraError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behave {
            Behave::Pass => Ok(Box::new(FakeStream::counted(
                format!("cam-{}", n),
                self.tally.clone(),
            ))),
            Behave::Fail => Err(CameraError::PermissionDenied("denied by user".into())),
            Behave::Hang => std::future::pending().await,
        }
    }
}

struct FakeModels {
    object: Behave,
    gaze: Behave,
}

#[async_trait]
impl ModelLoader for FakeModels {
    async fn load(&self, kind: ModelKind) -> Result<ModelHandle, ModelError> {
        let behave = match kind {
            ModelKind::ObjectDetection => self.object,
            ModelKind::Gaze => self.gaze,
        };
        match behave {
            Behave::Pass => Ok(ModelHandle {
                kind,
                name: kind.to_string(),
                source: "memory".into(),
                size_bytes: 1024,
            }),
            Behave::Fail => Err(ModelError::Fetch("offline".into())),
            Behave::Hang => std::future::pending().await,
        }
    }
}

struct FakeVerifier(Behave);

#[async_trait]
impl IdentityVerifier for FakeVerifier {
    async fn verify(&self, _frame: &Frame) -> Result<VerificationOutcome, RemoteError> {
        match self.0 {
            Behave::Pass => Ok(VerificationOutcome::verified()),
            Behave::Fail => Ok(VerificationOutcome {
                success: false,
                error: Some("Face does not match.".into()),
                ..VerificationOutcome::default()
            }),
            Behave::Hang => std::future::pending().await,
        }
    }
}

pub(crate) struct FakeAttempts {
    behave: Behave,
    tally: Arc<Tally>,
    calls: AtomicUsize,
    live_at_call: Mutex<Vec<usize>>,
}

impl FakeAttempts {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Live camera streams observed at each call.
    pub fn live_at_call(&self) -> Vec<usize> {
        self.live_at_call.lock().unwrap().clone()
    }
}

#[async_trait]
impl AttemptStarter for FakeAttempts {
    async fn start_attempt(&self, assessment: &AssessmentRef) -> Result<AttemptId, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.live_at_call.lock().unwrap().push(self.tally.live());
        match self.behave {
            Behave::Pass => Ok(AttemptId(format!("attempt-{}", assessment.job_id))),
            Behave::Fail => Err(RemoteError::Status {
                status: 500,
                message: "internal error".into(),
            }),
            Behave::Hang => std::future::pending().await,
        }
    }
}

struct FixedProbe(bool);

#[async_trait]
impl Probe for FixedProbe {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn check(&self) -> Result<ProbeResult, ProbeError> {
        Ok(ProbeResult {
            passed: self.0,
            detail: None,
        })
    }
}

struct HangingProbe;

#[async_trait]
impl Probe for HangingProbe {
    fn name(&self) -> &'static str {
        "hanging"
    }

    async fn check(&self) -> Result<ProbeResult, ProbeError> {
        std::future::pending().await
    }
}

/// How every collaborator of a session behaves.
#[derive(Debug, Clone)]
pub(crate) struct Script {
    pub camera: Behave,
    pub object: Behave,
    pub gaze: Behave,
    pub face: Behave,
    pub compatibility: [bool; 7],
    pub compatibility_hangs: bool,
    pub attempt: Behave,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            camera: Behave::Pass,
            object: Behave::Pass,
            gaze: Behave::Pass,
            face: Behave::Pass,
            compatibility: [true; 7],
            compatibility_hangs: false,
            attempt: Behave::Pass,
        }
    }
}

impl Script {
    /// All collaborators pass except the one `step` waits on, which hangs.
    pub fn hanging_at(step: ReadinessStep) -> Self {
        let mut script = Self::default();
        match step {
            ReadinessStep::CameraPermission => script.camera = Behave::Hang,
            ReadinessStep::ObjectModelLoad => script.object = Behave::Hang,
            ReadinessStep::GazeModelLoad => script.gaze = Behave::Hang,
            ReadinessStep::FaceVerify => script.face = Behave::Hang,
            ReadinessStep::CompatibilityCheck => script.compatibility_hangs = true,
            ReadinessStep::Ready => script.attempt = Behave::Hang,
            ReadinessStep::Details | ReadinessStep::CameraVerify => {}
        }
        script
    }

    pub fn rig(self) -> Rig {
        let tally = Arc::new(Tally::default());
        let camera = Arc::new(FakeCamera {
            tally: tally.clone(),
            behave: self.camera,
            calls: AtomicUsize::new(0),
        });
        let attempts = Arc::new(FakeAttempts {
            behave: self.attempt,
            tally: tally.clone(),
            calls: AtomicUsize::new(0),
            live_at_call: Mutex::new(Vec::new()),
        });

        let mut compatibility = CompatibilityProbe::new(Duration::from_secs(60));
        for check in CompatibilityCheck::ALL {
            compatibility =
                compatibility.with_probe(check, FixedProbe(self.compatibility[check as usize]));
        }
        if self.compatibility_hangs {
            compatibility = compatibility.with_probe(CompatibilityCheck::GraphicsBackend, HangingProbe);
        }

        let collaborators = Collaborators {
            camera: camera.clone(),
            models: Arc::new(FakeModels {
                object: self.object,
                gaze: self.gaze,
            }),
            verifier: Arc::new(FakeVerifier(self.face)),
            attempts: attempts.clone(),
            compatibility: Arc::new(compatibility),
        };
        Rig {
            tally,
            camera,
            attempts,
            collaborators,
        }
    }
}

pub(crate) struct Rig {
    pub tally: Arc<Tally>,
    pub camera: Arc<FakeCamera>,
    pub attempts: Arc<FakeAttempts>,
    pub collaborators: Collaborators,
}

pub(crate) fn assessment_ref() -> AssessmentRef {
    AssessmentRef {
        job_id: "job-42".into(),
        title: "Platform Engineer".into(),
    }
}

/// Directory serving a fixed set of assessments.
#[derive(Default)]
pub(crate) struct FakeDirectory {
    assessments: HashMap<String, Assessment>,
}

impl FakeDirectory {
    pub fn with(mut self, assessment: Assessment) -> Self {
        self.assessments
            .insert(assessment.job_id.clone(), assessment);
        self
    }
}

#[async_trait]
impl AssessmentDirectory for FakeDirectory {
    async fn assessment(&self, job_id: &str) -> Result<Assessment, RemoteError> {
        self.assessments
            .get(job_id)
            .cloned()
            .ok_or_else(|| RemoteError::Status {
                status: 404,
                message: format!("no assessment {}", job_id),
            })
    }
}
