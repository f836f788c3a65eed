use crate::actor::{SessionActor, SessionHandle};
use crate::capability::{AssessmentDirectory, Collaborators};
use crate::config::ReadinessConfig;
use crate::error::SessionError;
use crate::event::CloseReason;
use crate::eventbus::SharedEventBus;
use crate::schedule::{check_window, Assessment};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::Mutex;

/// ReadinessCoordinator owns the candidate's one live readiness session
pub struct ReadinessCoordinator {
    current: Mutex<Option<SessionHandle>>,
    directory: Arc<dyn AssessmentDirectory>,
    collaborators: Collaborators,
    config: ReadinessConfig,
    event_bus: SharedEventBus,
}

impl ReadinessCoordinator {
    pub fn new(
        directory: Arc<dyn AssessmentDirectory>,
        collaborators: Collaborators,
        config: ReadinessConfig,
        event_bus: SharedEventBus,
    ) -> Self {
        Self {
            current: Mutex::new(None),
            directory,
            collaborators,
            config,
            event_bus,
        }
    }

    pub fn event_bus(&self) -> &SharedEventBus {
        &self.event_bus
    }

    /// Look up an assessment and open a session for it
    pub async fn open(&self, job_id: &str) -> Result<SessionHandle, SessionError> {
        self.open_at(job_id, OffsetDateTime::now_utc()).await
    }

    pub async fn open_at(
        &self,
        job_id: &str,
        now: OffsetDateTime,
    ) -> Result<SessionHandle, SessionError> {
        let assessment = self.directory.assessment(job_id).await?;
        self.open_assessment(&assessment, now).await
    }

    /// Open a session for an assessment already in hand. A refused open leaves
    /// the current session untouched; an accepted one replaces it.
    pub async fn open_assessment(
        &self,
        assessment: &Assessment,
        now: OffsetDateTime,
    ) -> Result<SessionHandle, SessionError> {
        if let Err(e) = check_window(assessment, now) {
            tracing::warn!("Refused session for assessment {}: {}", assessment.job_id, e);
            return Err(e);
        }

        let mut current = self.current.lock().await;
        if let Some(previous) = current.take() {
            tracing::info!(
                "Replacing session {} for assessment {}",
                previous.id(),
                previous.assessment().job_id
            );
            previous.close(CloseReason::Replaced).await;
        }

        let handle = SessionActor::spawn(
            assessment.reference(),
            self.collaborators.clone(),
            self.config.timeouts.clone(),
            self.event_bus.clone(),
        );
        tracing::info!(
            "Opened session {} for assessment {}",
            handle.id(),
            assessment.job_id
        );
        *current = Some(handle.clone());
        Ok(handle)
    }

    /// The live session, if any
    pub async fn current(&self) -> Option<SessionHandle> {
        let mut current = self.current.lock().await;
        if current.as_ref().is_some_and(|handle| handle.is_closed()) {
            *current = None;
        }
        current.clone()
    }

    /// Cancel the live session, if any
    pub async fn close(&self) {
        let previous = self.current.lock().await.take();
        if let Some(handle) = previous {
            handle.cancel().await;
            tracing::info!("Closed session {}", handle.id());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RemoteError, StepError};
    use crate::eventbus::create_event_bus;
    use crate::step::ReadinessStep;
    use crate::testing::{FakeDirectory, Rig, Script};
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2025-03-01 10:00 UTC);

    fn assessment(job_id: &str) -> Assessment {
        Assessment {
            job_id: job_id.into(),
            title: "Data Engineer".into(),
            schedule_start: Some(datetime!(2025-03-01 09:00 UTC)),
            schedule_end: Some(datetime!(2025-03-01 18:00 UTC)),
            eligible: true,
        }
    }

    fn coordinator() -> (ReadinessCoordinator, Rig) {
        let rig = Script::default().rig();
        let directory = FakeDirectory::default()
            .with(assessment("job-1"))
            .with(Assessment {
                schedule_start: Some(datetime!(2025-03-02 09:00 UTC)),
                ..assessment("job-later")
            })
            .with(Assessment {
                eligible: false,
                ..assessment("job-closed")
            });
        let coordinator = ReadinessCoordinator::new(
            Arc::new(directory),
            rig.collaborators.clone(),
            ReadinessConfig::default(),
            create_event_bus(),
        );
        (coordinator, rig)
    }

    #[tokio::test]
    async fn test_future_assessment_is_refused() {
        let (coordinator, _rig) = coordinator();
        let err = coordinator.open_at("job-later", NOW).await.unwrap_err();
        assert_eq!(
            err,
            SessionError::NotYetOpen {
                starts_at: datetime!(2025-03-02 09:00 UTC)
            }
        );
        assert!(coordinator.current().await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_assessment_surfaces_directory_error() {
        let (coordinator, _rig) = coordinator();
        assert!(matches!(
            coordinator.open_at("job-missing", NOW).await,
            Err(SessionError::Directory(RemoteError::Status { status: 404, .. }))
        ));
    }

    #[tokio::test]
    async fn test_replacement_releases_previous_stream() {
        let (coordinator, rig) = coordinator();
        let first = coordinator.open_at("job-1", NOW).await.unwrap();
        first.advance().await.unwrap();
        first.advance().await.unwrap();
        assert_eq!(rig.tally.live(), 1);

        let second = coordinator.open_at("job-1", NOW).await.unwrap();
        assert_ne!(first.id(), second.id());
        assert_eq!(rig.tally.live(), 0);
        assert_eq!(first.snapshot().await, Err(StepError::SessionClosed));
        assert_eq!(
            second.snapshot().await.unwrap().step,
            ReadinessStep::Details
        );
        assert_eq!(coordinator.current().await.unwrap().id(), second.id());
    }

    #[tokio::test]
    async fn test_refused_open_keeps_current_session() {
        let (coordinator, rig) = coordinator();
        let first = coordinator.open_at("job-1", NOW).await.unwrap();
        first.advance().await.unwrap();
        first.advance().await.unwrap();

        assert!(matches!(
            coordinator.open_at("job-closed", NOW).await,
            Err(SessionError::NotEligible { .. })
        ));
        assert_eq!(rig.tally.live(), 1);
        assert_eq!(coordinator.current().await.unwrap().id(), first.id());

        coordinator.close().await;
        assert_eq!(rig.tally.live(), 0);
        assert!(coordinator.current().await.is_none());
    }
}
