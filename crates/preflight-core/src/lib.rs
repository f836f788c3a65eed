//! preflight-core: readiness state machine, capability probes and the
//! verification gate in front of an assessment attempt.
//!
//! Design goal: keep this crate UI-agnostic and platform-agnostic.
//! Camera devices, model assets and the remote services live behind the
//! traits in [`capability`] and [`probes::SystemFacts`]; `preflight-platform`
//! implements them.

mod actor;
pub mod capability;
mod command;
mod config;
mod coordinator;
mod error;
mod event;
mod eventbus;
mod gate;
mod machine;
pub mod probe;
pub mod probes;
mod report;
mod resources;
mod schedule;
mod session;
mod step;

#[cfg(test)]
mod testing;

pub use actor::{SessionActor, SessionHandle};
pub use capability::{
    AssessmentDirectory, AttemptId, AttemptStarter, Camera, CameraStream, Collaborators, Frame,
    IdentityVerifier, ModelHandle, ModelKind, ModelLoader, VerificationOutcome,
};
pub use command::SessionCommand;
pub use config::{ProbeThresholds, ReadinessConfig, TimeoutConfig};
pub use coordinator::ReadinessCoordinator;
pub use error::{CameraError, ModelError, ProbeError, RemoteError, SessionError, StepError};
pub use event::{CloseReason, ReadinessEvent};
pub use eventbus::{create_event_bus, EventBus, SharedEventBus};
pub use gate::{
    commit_gate, missing_for_commit, missing_for_ready, GateCondition, GateView,
    COMMIT_REQUIRED_CHECKS, STEP_REQUIRED_CHECKS,
};
pub use probe::{CompatibilityProbe, CompatibilityRun, Probe, ProbeOutcome, ProbeResult};
pub use probes::{standard_probes, SystemFacts};
pub use report::{describe_checks, CompatibilityCheck, CompatibilityReport};
pub use resources::{CameraLease, Resource};
pub use schedule::{check_window, parse_timestamp, Assessment, AssessmentRef};
pub use session::{SessionSnapshot, SessionState};
pub use step::ReadinessStep;
