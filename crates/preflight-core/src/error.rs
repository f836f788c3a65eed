//! Error types for the readiness workflow and its collaborators.

use crate::gate::GateCondition;
use crate::report::{describe_checks, CompatibilityCheck};
use crate::resources::Resource;
use crate::step::ReadinessStep;
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;

/// Failures reported by a camera device or stream.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CameraError {
    #[error("camera access denied: {0}")]
    PermissionDenied(String),
    #[error("no camera device found")]
    NoDevice,
    #[error("camera is in use: {0}")]
    Busy(String),
    #[error("camera stream is not live")]
    NotLive,
    #[error("camera I/O error: {0}")]
    Io(String),
}

/// Failures while loading a detection model.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("model asset not found: {0}")]
    NotFound(String),
    #[error("failed to fetch model asset: {0}")]
    Fetch(String),
    #[error("invalid model asset: {0}")]
    Invalid(String),
}

/// Failures talking to a remote collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("service unreachable: {0}")]
    Unreachable(String),
    #[error("service returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Failure inside a single capability probe. Never escapes the probe set:
/// it is recorded next to a `false` result for that one check.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("capability unavailable: {0}")]
    Unavailable(String),
    #[error("probe failed: {0}")]
    Failed(String),
    #[error("probe timed out after {0:?}")]
    TimedOut(Duration),
    #[error("probe panicked: {0}")]
    Panicked(String),
}

/// Why an `advance`, `retreat` or `commit` did not move the session forward.
/// Attached to the current step only; never reverts the step or releases
/// resources already held.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StepError {
    #[error("camera access denied: {0}")]
    PermissionDenied(String),

    #[error("failed to acquire {resource}: {reason}")]
    AcquisitionFailed { resource: Resource, reason: String },

    #[error("no live camera feed detected")]
    CameraUnavailable,

    #[error("could not capture camera image: {0}")]
    CaptureFailed(String),

    #[error("face verification failed: {0}")]
    RemoteVerificationFailed(String),

    #[error("face verification service unreachable: {0}")]
    RemoteVerificationUnreachable(String),

    #[error("compatibility check failed: {}", describe_checks(failing))]
    CompatibilityFailed {
        failing: BTreeSet<CompatibilityCheck>,
        /// Memory or storage is among the failures.
        resource_warning: bool,
    },

    #[error("{step} requires resources that are no longer held: {missing:?}")]
    PreconditionFailed {
        step: ReadinessStep,
        missing: Vec<Resource>,
    },

    #[error("session state is stale, missing: {missing:?}")]
    SessionStale { missing: Vec<GateCondition> },

    #[error("failed to start the assessment: {0}")]
    AttemptStartFailed(String),

    #[error("{step} timed out after {after:?}")]
    TimedOut { step: ReadinessStep, after: Duration },

    #[error("{step} is already in progress")]
    Busy { step: ReadinessStep },

    #[error("not all prerequisites are met to start the assessment (at {step})")]
    NotReady { step: ReadinessStep },

    #[error("session was cancelled")]
    Cancelled,

    #[error("session is closed")]
    SessionClosed,
}

/// Session creation refused before any state exists.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    #[error("this assessment has not yet started, it is scheduled for {starts_at}")]
    NotYetOpen { starts_at: OffsetDateTime },

    #[error("assessment period has ended, it ended at {ended_at}")]
    AlreadyEnded { ended_at: OffsetDateTime },

    #[error("candidate is not eligible for assessment {job_id}")]
    NotEligible { job_id: String },

    #[error("failed to load assessment: {0}")]
    Directory(#[from] RemoteError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compatibility_message_lists_checks() {
        let err = StepError::CompatibilityFailed {
            failing: [
                CompatibilityCheck::SufficientStorage,
                CompatibilityCheck::GraphicsBackend,
            ]
            .into_iter()
            .collect(),
            resource_warning: true,
        };
        assert_eq!(
            err.to_string(),
            "compatibility check failed: Graphics acceleration, Sufficient storage"
        );
    }
}
