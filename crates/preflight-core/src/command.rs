use crate::capability::AttemptId;
use crate::error::StepError;
use crate::event::CloseReason;
use crate::session::SessionSnapshot;
use tokio::sync::oneshot;

pub type Reply<T> = oneshot::Sender<T>;

/// Commands that can be sent to a SessionActor
#[derive(Debug)]
pub enum SessionCommand {
    /// Run the current step and move to the next one if it succeeds
    Advance {
        reply: Reply<Result<SessionSnapshot, StepError>>,
    },

    /// Step back one step, releasing what the re-entered step acquires
    Retreat { reply: Reply<SessionSnapshot> },

    /// Re-check the gate and start the assessment attempt
    Commit {
        reply: Reply<Result<AttemptId, StepError>>,
    },

    /// Read the current state
    Snapshot { reply: Reply<SessionSnapshot> },

    /// Release everything and end the session
    Cancel { reason: CloseReason, reply: Reply<()> },
}

impl SessionCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Advance { .. } => "advance",
            Self::Retreat { .. } => "retreat",
            Self::Commit { .. } => "commit",
            Self::Snapshot { .. } => "snapshot",
            Self::Cancel { .. } => "cancel",
        }
    }
}
