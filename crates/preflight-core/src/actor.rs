//! Session actor and its handle.
//!
//! One actor task owns one [`SessionState`]. Every side effect runs in its own
//! task, bounded by a timeout and by the session's cancellation token, so the
//! actor keeps answering commands while a camera opens or a model loads. At
//! most one effect is in flight per session.

use crate::capability::{AttemptId, Collaborators};
use crate::command::{Reply, SessionCommand};
use crate::config::TimeoutConfig;
use crate::error::{CameraError, RemoteError, StepError};
use crate::event::{CloseReason, ReadinessEvent};
use crate::eventbus::SharedEventBus;
use crate::machine::{self, Effect, Outcome, Plan};
use crate::resources::{CameraLease, Resource};
use crate::schedule::AssessmentRef;
use crate::session::{SessionSnapshot, SessionState};
use crate::step::ReadinessStep;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handle to communicate with a SessionActor. Cheap to clone; the session
/// ends with [`CloseReason::Abandoned`] once every clone is dropped.
#[derive(Clone)]
pub struct SessionHandle {
    id: String,
    assessment: AssessmentRef,
    cmd_tx: mpsc::Sender<SessionCommand>,
    token: CancellationToken,
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("job_id", &self.assessment.job_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn assessment(&self) -> &AssessmentRef {
        &self.assessment
    }

    /// Whether the actor has stopped taking commands.
    pub fn is_closed(&self) -> bool {
        self.cmd_tx.is_closed()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> SessionCommand,
    ) -> Result<T, StepError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(command(reply))
            .await
            .map_err(|_| StepError::SessionClosed)?;
        rx.await.map_err(|_| StepError::SessionClosed)
    }

    /// Run the current step; on success the session moves to the next one.
    pub async fn advance(&self) -> Result<SessionSnapshot, StepError> {
        self.request(|reply| SessionCommand::Advance { reply }).await?
    }

    /// Step back once. Aborts an in-flight effect of the current step.
    pub async fn retreat(&self) -> Result<SessionSnapshot, StepError> {
        self.request(|reply| SessionCommand::Retreat { reply }).await
    }

    /// Start the assessment attempt. Only valid at `Ready`.
    pub async fn commit(&self) -> Result<AttemptId, StepError> {
        self.request(|reply| SessionCommand::Commit { reply }).await?
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, StepError> {
        self.request(|reply| SessionCommand::Snapshot { reply }).await
    }

    /// Stop the session and release every resource. Returns once the actor
    /// has done so. Calling it on a closed session is a no-op.
    pub async fn cancel(&self) {
        self.close(CloseReason::Cancelled).await;
    }

    pub(crate) async fn close(&self, reason: CloseReason) {
        self.token.cancel();
        let _ = self
            .request(|reply| SessionCommand::Cancel { reason, reply })
            .await;
    }
}

enum Bounded<T> {
    Done(T),
    TimedOut(Duration),
    Cancelled,
    Crashed(String),
}

/// A side effect in flight together with whoever waits for it.
struct Inflight<T, U> {
    step: ReadinessStep,
    token: CancellationToken,
    task: JoinHandle<Bounded<T>>,
    reply: Option<Reply<Result<U, StepError>>>,
}

impl<T, U> Inflight<T, U> {
    async fn join(&mut self) -> Bounded<T> {
        match (&mut self.task).await {
            Ok(bounded) => bounded,
            Err(e) => Bounded::Crashed(e.to_string()),
        }
    }

    fn abort(mut self) {
        self.token.cancel();
        self.task.abort();
        if let Some(reply) = self.reply.take() {
            let _ = reply.send(Err(StepError::Cancelled));
        }
    }
}

enum Pending {
    Advance(Inflight<Outcome, SessionSnapshot>),
    Commit(Inflight<Result<AttemptId, RemoteError>, AttemptId>),
}

impl Pending {
    fn step(&self) -> ReadinessStep {
        match self {
            Self::Advance(inflight) => inflight.step,
            Self::Commit(inflight) => inflight.step,
        }
    }

    fn abort(self) {
        match self {
            Self::Advance(inflight) => inflight.abort(),
            Self::Commit(inflight) => inflight.abort(),
        }
    }
}

enum Joined {
    Advance {
        step: ReadinessStep,
        reply: Option<Reply<Result<SessionSnapshot, StepError>>>,
        bounded: Bounded<Outcome>,
    },
    Commit {
        reply: Option<Reply<Result<AttemptId, StepError>>>,
        bounded: Bounded<Result<AttemptId, RemoteError>>,
    },
}

/// Wait for the in-flight effect, if any, and clear the slot.
async fn join_pending(slot: &mut Option<Pending>) -> Joined {
    let joined = match slot {
        Some(Pending::Advance(inflight)) => {
            let bounded = inflight.join().await;
            Joined::Advance {
                step: inflight.step,
                reply: inflight.reply.take(),
                bounded,
            }
        }
        Some(Pending::Commit(inflight)) => {
            let bounded = inflight.join().await;
            Joined::Commit {
                reply: inflight.reply.take(),
                bounded,
            }
        }
        None => return std::future::pending().await,
    };
    *slot = None;
    joined
}

fn spawn_bounded<T, F>(token: CancellationToken, limit: Duration, work: F) -> JoinHandle<Bounded<T>>
where
    T: Send + 'static,
    F: Future<Output = T> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = token.cancelled() => Bounded::Cancelled,
            done = tokio::time::timeout(limit, work) => match done {
                Ok(output) => Bounded::Done(output),
                Err(_) => Bounded::TimedOut(limit),
            },
        }
    })
}

/// Step error for an effect task that died without producing an outcome.
fn crash_error(step: ReadinessStep, reason: String) -> StepError {
    match step.acquires() {
        Some(resource) => StepError::AcquisitionFailed { resource, reason },
        None => StepError::AttemptStartFailed(reason),
    }
}

/// SessionActor drives a single readiness session
pub struct SessionActor {
    state: SessionState,
    collaborators: Collaborators,
    timeouts: TimeoutConfig,
    cmd_rx: mpsc::Receiver<SessionCommand>,
    event_bus: SharedEventBus,
    token: CancellationToken,
    pending: Option<Pending>,
}

impl SessionActor {
    /// Create a new session and return a handle
    pub fn spawn(
        assessment: AssessmentRef,
        collaborators: Collaborators,
        timeouts: TimeoutConfig,
        event_bus: SharedEventBus,
    ) -> SessionHandle {
        let id = ulid::Ulid::new().to_string();
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let token = CancellationToken::new();

        let actor = Self {
            state: SessionState::new(id.clone(), assessment.clone()),
            collaborators,
            timeouts,
            cmd_rx,
            event_bus: event_bus.clone(),
            token: token.clone(),
            pending: None,
        };

        event_bus.publish(ReadinessEvent::SessionOpened {
            session_id: id.clone(),
            job_id: assessment.job_id.clone(),
            title: assessment.title.clone(),
        });

        tokio::spawn(actor.run());

        SessionHandle {
            id,
            assessment,
            cmd_tx,
            token,
        }
    }

    /// Main run loop
    pub async fn run(mut self) {
        tracing::info!(
            "Session {} started for assessment {}",
            self.state.id,
            self.state.assessment.job_id
        );

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => {
                        if !self.handle_command(cmd) {
                            break;
                        }
                    }
                    None => {
                        self.close(CloseReason::Abandoned);
                        break;
                    }
                },
                joined = join_pending(&mut self.pending) => {
                    if !self.on_joined(joined) {
                        break;
                    }
                }
            }
        }

        tracing::info!("Session {} stopped", self.state.id);
    }

    /// Returns false once the session is closed.
    fn handle_command(&mut self, cmd: SessionCommand) -> bool {
        tracing::debug!("Session {} received {}", self.state.id, cmd.name());
        match cmd {
            SessionCommand::Advance { reply } => self.advance(reply),
            SessionCommand::Retreat { reply } => {
                let _ = reply.send(self.retreat());
            }
            SessionCommand::Commit { reply } => self.commit(reply),
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            SessionCommand::Cancel { reason, reply } => {
                self.close(reason);
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    fn advance(&mut self, reply: Reply<Result<SessionSnapshot, StepError>>) {
        if let Some(pending) = &self.pending {
            let _ = reply.send(Err(StepError::Busy {
                step: pending.step(),
            }));
            return;
        }

        let step = self.state.step;
        if step.is_terminal() {
            let _ = reply.send(Ok(self.snapshot()));
            return;
        }

        self.state.last_error = None;
        match machine::plan(&mut self.state) {
            Plan::Settled(result) => {
                let _ = reply.send(self.finish_advance(step, result));
            }
            Plan::Suspend(effect) => self.suspend(step, effect, reply),
        }
    }

    fn suspend(
        &mut self,
        step: ReadinessStep,
        effect: Effect,
        reply: Reply<Result<SessionSnapshot, StepError>>,
    ) {
        let token = self.token.child_token();
        let task = match effect {
            Effect::AcquireCamera => {
                let camera = self.collaborators.camera.clone();
                spawn_bounded(token.clone(), self.timeouts.camera_acquire(), async move {
                    Outcome::Camera(camera.acquire().await.map(CameraLease::new))
                })
            }
            Effect::LoadModel(kind) => {
                let models = self.collaborators.models.clone();
                spawn_bounded(token.clone(), self.timeouts.model_load(), async move {
                    Outcome::Model(kind, models.load(kind).await)
                })
            }
            Effect::VerifyFace(stream) => {
                let verifier = self.collaborators.verifier.clone();
                spawn_bounded(token.clone(), self.timeouts.face_verify(), async move {
                    let frame = match stream.capture_frame().await {
                        Ok(frame) => frame,
                        Err(CameraError::NotLive) => {
                            return Outcome::Face(Err(StepError::CameraUnavailable))
                        }
                        Err(e) => return Outcome::Face(Err(StepError::CaptureFailed(e.to_string()))),
                    };
                    Outcome::Face(
                        verifier
                            .verify(&frame)
                            .await
                            .map_err(|e| StepError::RemoteVerificationUnreachable(e.to_string())),
                    )
                })
            }
            Effect::CheckCompatibility => {
                let probe = self.collaborators.compatibility.clone();
                let limit = self.timeouts.compatibility();
                spawn_bounded(token.clone(), limit, async move {
                    Outcome::Compatibility(probe.run_within(limit).await)
                })
            }
        };

        tracing::debug!("Session {} waiting on {}", self.state.id, step);
        self.pending = Some(Pending::Advance(Inflight {
            step,
            token,
            task,
            reply: Some(reply),
        }));
    }

    /// Record the result of an advance from `step` and build the reply.
    fn finish_advance(
        &mut self,
        step: ReadinessStep,
        result: Result<(), StepError>,
    ) -> Result<SessionSnapshot, StepError> {
        match result {
            Ok(()) => {
                if let Some(resource) = step.acquires() {
                    self.publish(ReadinessEvent::ResourceAcquired {
                        session_id: self.state.id.clone(),
                        resource,
                    });
                }
                if let Some(next) = step.next() {
                    self.state.step = next;
                    self.publish(ReadinessEvent::StepChanged {
                        session_id: self.state.id.clone(),
                        old_step: step,
                        new_step: next,
                    });
                }
                Ok(self.snapshot())
            }
            Err(e) => {
                self.fail_step(step, &e);
                Err(e)
            }
        }
    }

    fn fail_step(&mut self, step: ReadinessStep, error: &StepError) {
        tracing::warn!("Session {} failed at {}: {}", self.state.id, step, error);
        self.state.last_error = Some(error.to_string());
        self.publish(ReadinessEvent::StepFailed {
            session_id: self.state.id.clone(),
            step,
            message: error.to_string(),
        });
    }

    /// Returns false once the session is closed.
    fn on_joined(&mut self, joined: Joined) -> bool {
        match joined {
            Joined::Advance {
                step,
                reply,
                bounded,
            } => {
                let result = match bounded {
                    Bounded::Cancelled => Err(StepError::Cancelled),
                    Bounded::Done(outcome) => {
                        self.observe(&outcome);
                        let settled = machine::settle(&mut self.state, outcome);
                        self.finish_advance(step, settled)
                    }
                    Bounded::TimedOut(after) => {
                        self.finish_advance(step, Err(StepError::TimedOut { step, after }))
                    }
                    Bounded::Crashed(reason) => {
                        self.finish_advance(step, Err(crash_error(step, reason)))
                    }
                };
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
                true
            }
            Joined::Commit { reply, bounded } => {
                let result = match bounded {
                    Bounded::Done(Ok(attempt_id)) => Ok(attempt_id),
                    Bounded::Done(Err(e)) => Err(StepError::AttemptStartFailed(e.to_string())),
                    Bounded::TimedOut(after) => Err(StepError::TimedOut {
                        step: ReadinessStep::Ready,
                        after,
                    }),
                    Bounded::Cancelled => Err(StepError::Cancelled),
                    Bounded::Crashed(reason) => Err(StepError::AttemptStartFailed(reason)),
                };

                match result {
                    Ok(attempt_id) => {
                        tracing::info!("Session {} started attempt {}", self.state.id, attempt_id);
                        self.publish(ReadinessEvent::AttemptStarted {
                            session_id: self.state.id.clone(),
                            attempt_id: attempt_id.to_string(),
                        });
                        self.close(CloseReason::HandedOff);
                        if let Some(reply) = reply {
                            let _ = reply.send(Ok(attempt_id));
                        }
                        false
                    }
                    Err(e) => {
                        if e != StepError::Cancelled {
                            self.fail_step(ReadinessStep::Ready, &e);
                        }
                        if let Some(reply) = reply {
                            let _ = reply.send(Err(e));
                        }
                        true
                    }
                }
            }
        }
    }

    /// Publish what an outcome reveals before it is applied.
    fn observe(&self, outcome: &Outcome) {
        if let Outcome::Compatibility(run) = outcome {
            for failed in run.outcomes.iter().filter(|o| !o.passed) {
                tracing::info!(
                    "Session {} check '{}' failed via {}: {}",
                    self.state.id,
                    failed.check,
                    failed.probe,
                    failed
                        .error
                        .as_ref()
                        .map(ToString::to_string)
                        .or_else(|| failed.detail.clone())
                        .unwrap_or_default()
                );
            }
            self.publish(ReadinessEvent::CompatibilityReported {
                session_id: self.state.id.clone(),
                report: run.report,
            });
            if run.report.resource_warning() {
                self.publish(ReadinessEvent::ResourceWarning {
                    session_id: self.state.id.clone(),
                    failing: run
                        .report
                        .failing()
                        .into_iter()
                        .filter(|check| check.is_resource_check())
                        .collect(),
                });
            }
        }
    }

    fn retreat(&mut self) -> SessionSnapshot {
        if let Some(pending) = self.pending.take() {
            tracing::debug!("Session {} aborting {}", self.state.id, pending.step());
            pending.abort();
        }
        self.state.last_error = None;

        let current = self.state.step;
        if let Some(target) = current.previous() {
            self.state.step = target;
            let released = self.state.release_from(target);
            self.publish_released(released);
            self.publish(ReadinessEvent::StepChanged {
                session_id: self.state.id.clone(),
                old_step: current,
                new_step: target,
            });
        }
        self.snapshot()
    }

    fn commit(&mut self, reply: Reply<Result<AttemptId, StepError>>) {
        if let Some(pending) = &self.pending {
            let _ = reply.send(Err(StepError::Busy {
                step: pending.step(),
            }));
            return;
        }
        if let Err(e) = machine::check_commit(&self.state) {
            tracing::warn!("Session {} refused commit: {}", self.state.id, e);
            let _ = reply.send(Err(e));
            return;
        }

        // The attempt claims the camera itself.
        if self.state.release(Resource::CameraStream) {
            self.publish_released(vec![Resource::CameraStream]);
        }
        self.state.last_error = None;

        let attempts = self.collaborators.attempts.clone();
        let assessment = self.state.assessment.clone();
        let token = self.token.child_token();
        let task = spawn_bounded(token.clone(), self.timeouts.attempt_start(), async move {
            attempts.start_attempt(&assessment).await
        });
        self.pending = Some(Pending::Commit(Inflight {
            step: ReadinessStep::Ready,
            token,
            task,
            reply: Some(reply),
        }));
    }

    fn close(&mut self, reason: CloseReason) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
        self.token.cancel();
        let released = self.state.release_all();
        self.publish_released(released);
        tracing::info!("Session {} closed: {:?}", self.state.id, reason);
        self.publish(ReadinessEvent::SessionClosed {
            session_id: self.state.id.clone(),
            reason,
        });
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            in_progress: self.pending.is_some(),
            ..self.state.snapshot()
        }
    }

    fn publish_released(&self, resources: Vec<Resource>) {
        for resource in resources {
            self.publish(ReadinessEvent::ResourceReleased {
                session_id: self.state.id.clone(),
                resource,
            });
        }
    }

    fn publish(&self, event: ReadinessEvent) {
        self.event_bus.publish(event);
    }
}
