//! The coordinator: owns the session and decides what reaches it.
//!
//! Foreground triggers (the owner typing, a head pat) always run: they cancel
//! the in-flight observation job and any earlier foreground job before
//! taking their snapshot. Observation triggers run only while capture is
//! enabled and nothing else is in flight. A finished job is committed under
//! the session write lock, and only if its token is still clear and the
//! session version has not moved since its snapshot. Committed bundles
//! reach the result sink from a single delivery task, after the lock is
//! released.

use async_trait::async_trait;
use chrono::Utc;
use murasame_core::{DomainEvent, EventBus, Persona};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{RwLock, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::job::{JobBundle, JobRun, PartialState, PipelineJob, Stage, Trigger};
use crate::pipeline::Pipeline;
use crate::session::{Session, SessionSnapshot};

/// Receives every committed bundle, one at a time and in commit order.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn apply(&self, bundle: &JobBundle);
}

/// How a submitted job ended.
#[derive(Debug)]
pub enum JobOutcome {
    /// Committed to the session and queued for the sink
    Completed(Box<JobBundle>),

    /// The token was set. `before` is the stage that did not run; `None`
    /// when every stage ran but the job was cancelled before its commit.
    Cancelled {
        before: Option<Stage>,
        partial: PartialState,
    },

    /// The session moved on while the job ran; nothing was emitted
    Stale { job_version: u64, session_version: u64 },

    Failed(PipelineError),
}

impl JobOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// A running job. Dropping the handle does not cancel the job.
#[derive(Debug)]
pub struct JobHandle {
    job_id: String,
    token: CancellationToken,
    outcome: oneshot::Receiver<JobOutcome>,
}

impl JobHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait for the job's one and only outcome.
    pub async fn wait(self) -> JobOutcome {
        self.outcome
            .await
            .unwrap_or(JobOutcome::Failed(PipelineError::Aborted))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lane {
    Foreground,
    Observation,
}

struct Running {
    job_id: String,
    token: CancellationToken,
}

#[derive(Default)]
struct Slots {
    foreground: Option<Running>,
    observation: Option<Running>,
}

impl Slots {
    /// Claim `lane` for a new job and return its id.
    fn occupy(&mut self, lane: Lane, token: &CancellationToken) -> String {
        let job_id = uuid::Uuid::new_v4().to_string();
        *self.lane(lane) = Some(Running {
            job_id: job_id.clone(),
            token: token.clone(),
        });
        job_id
    }

    fn lane(&mut self, lane: Lane) -> &mut Option<Running> {
        match lane {
            Lane::Foreground => &mut self.foreground,
            Lane::Observation => &mut self.observation,
        }
    }

    fn cancel(&mut self, lane: Lane) {
        if let Some(running) = self.lane(lane).take() {
            info!(job_id = %running.job_id, ?lane, "Cancelling job");
            running.token.cancel();
        }
    }
}

struct Shared {
    pipeline: Arc<Pipeline>,
    session: RwLock<Session>,
    slots: Mutex<Slots>,
    deliveries: Option<mpsc::UnboundedSender<Box<JobBundle>>>,
}

impl Shared {
    fn slots(&self) -> MutexGuard<'_, Slots> {
        // Slots hold no invariant a panicking holder could break.
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn events(&self) -> &EventBus {
        self.pipeline.events()
    }

    async fn settle(
        &self,
        job_id: &str,
        token: &CancellationToken,
        result: Result<JobRun, PipelineError>,
    ) -> JobOutcome {
        let bundle = match result {
            Ok(JobRun::Completed(bundle)) => bundle,
            Ok(JobRun::Cancelled { before, partial }) => {
                return JobOutcome::Cancelled {
                    before: Some(before),
                    partial,
                };
            }
            Err(e) => {
                warn!(job_id, error = %e, "Job failed");
                self.events().publish(DomainEvent::JobFailed {
                    job_id: job_id.to_string(),
                    stage: e.stage().map(|s| s.to_string()).unwrap_or_default(),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                return JobOutcome::Failed(e);
            }
        };

        let mut session = self.session.write().await;
        if token.is_cancelled() {
            info!(job_id, "Job cancelled before commit");
            self.events().publish(DomainEvent::JobCancelled {
                job_id: job_id.to_string(),
                before_stage: "commit".into(),
                timestamp: Utc::now(),
            });
            return JobOutcome::Cancelled {
                before: None,
                partial: partial_of(&bundle),
            };
        }

        match session.commit(&bundle) {
            Ok(version) => {
                info!(job_id, version, emotion = %bundle.emotion, "Job committed");
                self.events().publish(DomainEvent::JobCompleted {
                    job_id: job_id.to_string(),
                    emotion: bundle.emotion.clone(),
                    layers: bundle.layers.clone(),
                    timestamp: Utc::now(),
                });
                // Queued under the lock so deliveries keep commit order.
                if let Some(deliveries) = &self.deliveries
                    && deliveries.send(bundle.clone()).is_err()
                {
                    warn!(job_id, "Result sink has stopped");
                }
                JobOutcome::Completed(bundle)
            }
            Err(stale) => {
                warn!(job_id, job_version = stale.job_version, session_version = stale.session_version, "Discarding stale result");
                self.events().publish(DomainEvent::StaleResultDiscarded {
                    job_id: job_id.to_string(),
                    job_version: stale.job_version,
                    session_version: stale.session_version,
                    timestamp: Utc::now(),
                });
                JobOutcome::Stale {
                    job_version: stale.job_version,
                    session_version: stale.session_version,
                }
            }
        }
    }

    fn release(&self, lane: Lane, job_id: &str) {
        let mut slots = self.slots();
        let slot = slots.lane(lane);
        if slot.as_ref().is_some_and(|running| running.job_id == job_id) {
            *slot = None;
        }
    }
}

/// Feed `sink` from a channel so a slow sink never holds up the session.
fn deliver_to(sink: Arc<dyn ResultSink>) -> mpsc::UnboundedSender<Box<JobBundle>> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Box<JobBundle>>();
    tokio::spawn(async move {
        while let Some(bundle) = rx.recv().await {
            sink.apply(&bundle).await;
        }
    });
    tx
}

fn partial_of(bundle: &JobBundle) -> PartialState {
    PartialState {
        dialogue: Some(bundle.dialogue.clone()),
        reply: Some(bundle.reply.clone()),
        translated: Some(bundle.translated.clone()),
        emotion: Some(bundle.emotion.clone()),
        emotion_history: Some(bundle.emotion_history.clone()),
        layers: Some(bundle.layers.clone()),
        layer_history: Some(bundle.layer_history.clone()),
        audio: bundle.audio.clone(),
    }
}

/// Owns the session and schedules jobs on it.
pub struct Coordinator {
    shared: Arc<Shared>,
    persona: Persona,
    capture: AtomicBool,
}

impl Coordinator {
    /// A coordinator with a fresh session and no sink. Capture starts
    /// disabled.
    pub fn new(pipeline: Arc<Pipeline>, persona: Persona) -> Self {
        Self::build(pipeline, persona, None)
    }

    /// Like [`Coordinator::new`], forwarding committed bundles to `sink`.
    /// Must be called inside a tokio runtime.
    pub fn with_sink(
        pipeline: Arc<Pipeline>,
        persona: Persona,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self::build(pipeline, persona, Some(deliver_to(sink)))
    }

    fn build(
        pipeline: Arc<Pipeline>,
        persona: Persona,
        deliveries: Option<mpsc::UnboundedSender<Box<JobBundle>>>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                pipeline,
                session: RwLock::new(Session::new(&persona)),
                slots: Mutex::new(Slots::default()),
                deliveries,
            }),
            persona,
            capture: AtomicBool::new(false),
        }
    }

    pub fn with_capture(self, enabled: bool) -> Self {
        self.capture.store(enabled, Ordering::SeqCst);
        self
    }

    pub fn events(&self) -> &EventBus {
        self.shared.events()
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// The owner said something.
    pub async fn submit_user(&self, text: impl Into<String>) -> JobHandle {
        self.submit_foreground(Trigger::user(text)).await
    }

    /// The owner patted the companion's head.
    pub async fn submit_head_pat(&self) -> JobHandle {
        self.submit_foreground(Trigger::head_pat()).await
    }

    async fn submit_foreground(&self, trigger: Trigger) -> JobHandle {
        let token = CancellationToken::new();
        // The slot is claimed before the snapshot so nothing can slip in
        // while we wait for the session.
        let job_id = {
            let mut slots = self.shared.slots();
            slots.cancel(Lane::Observation);
            slots.cancel(Lane::Foreground);
            slots.occupy(Lane::Foreground, &token)
        };
        let snapshot = self.snapshot().await;
        let mut job = PipelineJob::new(trigger, snapshot, token);
        job.id = job_id;
        self.spawn(job, Lane::Foreground)
    }

    /// Something changed on screen. Refused (`None`) while capture is
    /// disabled or another job is in flight.
    pub async fn submit_observation(&self, description: impl Into<String>) -> Option<JobHandle> {
        if !self.capture_enabled() {
            return None;
        }
        let token = CancellationToken::new();
        let trigger = Trigger::observation(description);
        let job_id = {
            let mut slots = self.shared.slots();
            if slots.foreground.is_some() || slots.observation.is_some() {
                info!("Observation refused: another job is in flight");
                return None;
            }
            slots.occupy(Lane::Observation, &token)
        };
        let snapshot = self.snapshot().await;
        let mut job = PipelineJob::new(trigger, snapshot, token);
        job.id = job_id;
        Some(self.spawn(job, Lane::Observation))
    }

    fn spawn(&self, job: PipelineJob, lane: Lane) -> JobHandle {
        let (tx, rx) = oneshot::channel();
        let handle = JobHandle {
            job_id: job.id.clone(),
            token: job.token.clone(),
            outcome: rx,
        };
        let shared = self.shared.clone();
        tokio::spawn(async move {
            let job_id = job.id.clone();
            let token = job.token.clone();
            let result = shared.pipeline.run(job).await;
            let outcome = shared.settle(&job_id, &token, result).await;
            shared.release(lane, &job_id);
            // The submitter may have dropped the handle.
            let _ = tx.send(outcome);
        });
        handle
    }

    /// The companion's window took focus: stop watching the screen.
    pub fn focus_gained(&self) {
        self.set_capture(false);
    }

    /// The companion's window lost focus: watch the screen again.
    pub fn focus_lost(&self) {
        self.set_capture(true);
    }

    /// Disabling capture also cancels the observation job in flight.
    pub fn set_capture(&self, enabled: bool) {
        self.capture.store(enabled, Ordering::SeqCst);
        if !enabled {
            self.shared.slots().cancel(Lane::Observation);
        }
    }

    pub fn capture_enabled(&self) -> bool {
        self.capture.load(Ordering::SeqCst)
    }

    /// Cancel everything and start the conversation over.
    pub async fn reset(&self) {
        {
            let mut slots = self.shared.slots();
            slots.cancel(Lane::Observation);
            slots.cancel(Lane::Foreground);
        }
        let mut session = self.shared.session.write().await;
        session.reset(&self.persona);
        info!(version = session.version(), "Session reset");
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.shared.session.read().await.snapshot()
    }

    /// Whether any job currently occupies a slot.
    pub fn busy(&self) -> bool {
        let slots = self.shared.slots();
        slots.foreground.is_some() || slots.observation.is_some()
    }
}
