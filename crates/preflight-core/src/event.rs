use crate::report::{CompatibilityCheck, CompatibilityReport};
use crate::resources::Resource;
use crate::step::ReadinessStep;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CloseReason {
    /// The candidate or the host called `cancel`.
    Cancelled,
    /// A new session was opened for the same candidate.
    Replaced,
    /// Commit succeeded and the attempt took over.
    HandedOff,
    /// Every handle was dropped.
    Abandoned,
}

/// Events that represent readiness state changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ReadinessEvent {
    /// A new session was opened
    SessionOpened {
        session_id: String,
        job_id: String,
        title: String,
    },

    /// The current step changed (advance or retreat)
    StepChanged {
        session_id: String,
        old_step: ReadinessStep,
        new_step: ReadinessStep,
    },

    /// The current step failed and stays current
    StepFailed {
        session_id: String,
        step: ReadinessStep,
        message: String,
    },

    ResourceAcquired {
        session_id: String,
        resource: Resource,
    },

    ResourceReleased {
        session_id: String,
        resource: Resource,
    },

    /// A compatibility run finished, passing or not
    CompatibilityReported {
        session_id: String,
        report: CompatibilityReport,
    },

    /// Memory or storage is below the minimum
    ResourceWarning {
        session_id: String,
        failing: BTreeSet<CompatibilityCheck>,
    },

    /// The assessment attempt started
    AttemptStarted {
        session_id: String,
        attempt_id: String,
    },

    /// Session ended; every resource is released
    SessionClosed {
        session_id: String,
        reason: CloseReason,
    },
}

impl ReadinessEvent {
    pub fn session_id(&self) -> &str {
        match self {
            Self::SessionOpened { session_id, .. } => session_id,
            Self::StepChanged { session_id, .. } => session_id,
            Self::StepFailed { session_id, .. } => session_id,
            Self::ResourceAcquired { session_id, .. } => session_id,
            Self::ResourceReleased { session_id, .. } => session_id,
            Self::CompatibilityReported { session_id, .. } => session_id,
            Self::ResourceWarning { session_id, .. } => session_id,
            Self::AttemptStarted { session_id, .. } => session_id,
            Self::SessionClosed { session_id, .. } => session_id,
        }
    }

    /// Get the event type name for subscribers that route on it
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::SessionOpened { .. } => "session_opened",
            Self::StepChanged { .. } => "step_changed",
            Self::StepFailed { .. } => "step_failed",
            Self::ResourceAcquired { .. } => "resource_acquired",
            Self::ResourceReleased { .. } => "resource_released",
            Self::CompatibilityReported { .. } => "compatibility_reported",
            Self::ResourceWarning { .. } => "resource_warning",
            Self::AttemptStarted { .. } => "attempt_started",
            Self::SessionClosed { .. } => "session_closed",
        }
    }
}
