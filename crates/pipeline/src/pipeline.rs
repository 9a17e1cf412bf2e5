//! The stage runner.
//!
//! [`Pipeline::run`] executes S0..S6 for one job against its snapshot. The
//! token is checked before every stage, between generation attempts, and
//! raced against the final artifact wait. All stage outputs stay inside the
//! job; the coordinator decides whether they reach the session.

use chrono::{DateTime, Local, Utc};
use murasame_config::AppConfig;
use murasame_core::{
    DomainEvent, EventBus, GenerationRequest, SpeechSynthesizer, TextGenerator, Turn, display_text,
};
use murasame_sprite::{ArtVariant, SpriteError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::artifact::ArtifactStore;
use crate::error::PipelineError;
use crate::job::{JobBundle, JobRun, PartialState, PipelineJob, Stage};
use crate::stages::emotion::{self, EmotionCatalog};
use crate::stages::generate::{self, RepeatPolicy};
use crate::stages::speech::{self, ArtifactWait};
use crate::stages::{annotate, layers, translate};

/// Tunables for a pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub repeat: RepeatPolicy,
    pub artifact_timeout: Duration,
    pub artifact_poll: Duration,
    pub wrap_width: usize,
    pub variant: ArtVariant,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            repeat: RepeatPolicy::default(),
            artifact_timeout: Duration::from_secs(60),
            artifact_poll: Duration::from_millis(100),
            wrap_width: 12,
            variant: ArtVariant::B,
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, SpriteError> {
        let pipeline = &config.pipeline;
        Ok(Self {
            repeat: RepeatPolicy {
                max_attempts: pipeline.max_generation_attempts,
                exempt_len: pipeline.repeat_exempt_len,
            },
            artifact_timeout: pipeline.artifact_timeout(),
            artifact_poll: pipeline.artifact_poll_interval(),
            wrap_width: pipeline.wrap_width,
            variant: config.sprite.variant.parse()?,
        })
    }
}

/// The backends a job talks to.
#[derive(Clone)]
pub struct Collaborators {
    /// Produces the companion's replies
    pub persona: Arc<dyn TextGenerator>,

    /// Answers the control prompts (translation, emotion, layers)
    pub assistant: Arc<dyn TextGenerator>,

    pub speech: Arc<dyn SpeechSynthesizer>,
}

/// Runs jobs. Stateless between jobs; shareable.
pub struct Pipeline {
    collaborators: Collaborators,
    artifacts: Arc<dyn ArtifactStore>,
    emotions: EmotionCatalog,
    settings: PipelineSettings,
    events: Arc<EventBus>,
}

impl Pipeline {
    pub fn new(
        collaborators: Collaborators,
        artifacts: Arc<dyn ArtifactStore>,
        emotions: EmotionCatalog,
        settings: PipelineSettings,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            collaborators,
            artifacts,
            emotions,
            settings,
            events,
        }
    }

    pub fn emotions(&self) -> &EmotionCatalog {
        &self.emotions
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn artifacts(&self) -> &Arc<dyn ArtifactStore> {
        &self.artifacts
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Run a job against the local clock.
    pub async fn run(&self, job: PipelineJob) -> Result<JobRun, PipelineError> {
        self.run_at(job, Local::now()).await
    }

    /// Run a job with S0 annotating `now`.
    pub async fn run_at(
        &self,
        job: PipelineJob,
        now: DateTime<Local>,
    ) -> Result<JobRun, PipelineError> {
        let PipelineJob {
            id,
            trigger,
            snapshot,
            token,
        } = job;
        let mut partial = PartialState::default();

        info!(job_id = %id, role = %trigger.role, version = snapshot.version, "Job started");
        self.events.publish(DomainEvent::JobStarted {
            job_id: id.clone(),
            trigger_role: trigger.role.to_string(),
            session_version: snapshot.version,
            timestamp: Utc::now(),
        });

        // S0
        if let Some(run) = self.checkpoint(&token, &id, Stage::Annotate, &mut partial) {
            return Ok(run);
        }
        let started = Instant::now();
        let annotated = annotate::annotate(&snapshot.dialogue, &now);
        self.stage_done(&id, Stage::Annotate, started);

        // S1
        if let Some(run) = self.checkpoint(&token, &id, Stage::Generate, &mut partial) {
            return Ok(run);
        }
        let started = Instant::now();
        let previous = snapshot.dialogue.last().map(|turn| turn.content.as_str());
        let request = GenerationRequest::new(trigger.text.clone(), annotated, trigger.role);
        let generated = generate::generate_reply(
            self.collaborators.persona.as_ref(),
            request,
            previous,
            self.settings.repeat,
            &token,
        )
        .await
        .map_err(|e| PipelineError::backend(Stage::Generate, e))?;
        let Some(reply) = generated else {
            return Ok(self.cancelled(&id, Stage::Generate, partial));
        };
        let mut dialogue = snapshot.dialogue.clone();
        dialogue.push(Turn::new(trigger.role, trigger.text.clone()));
        dialogue.push(Turn::assistant(reply.clone()));
        partial.dialogue = Some(dialogue.clone());
        partial.reply = Some(reply.clone());
        self.stage_done(&id, Stage::Generate, started);

        // S2
        if let Some(run) = self.checkpoint(&token, &id, Stage::Translate, &mut partial) {
            return Ok(run);
        }
        let started = Instant::now();
        let translated = translate::translate(self.collaborators.assistant.as_ref(), &reply).await?;
        partial.translated = Some(translated.clone());
        self.stage_done(&id, Stage::Translate, started);

        // S3
        if let Some(run) = self.checkpoint(&token, &id, Stage::ClassifyEmotion, &mut partial) {
            return Ok(run);
        }
        let started = Instant::now();
        let classified = emotion::classify(
            self.collaborators.assistant.as_ref(),
            &self.emotions,
            &snapshot.emotion,
            &trigger.text,
            &reply,
        )
        .await?;
        if let Some(returned) = &classified.rejected {
            self.events.publish(DomainEvent::EmotionFallback {
                job_id: id.clone(),
                returned: returned.clone(),
                substituted: classified.label.clone(),
                timestamp: Utc::now(),
            });
        }
        let emotion = classified.label;
        partial.emotion = Some(emotion.clone());
        partial.emotion_history = Some(classified.history.clone());
        self.stage_done(&id, Stage::ClassifyEmotion, started);

        // S4
        if let Some(run) = self.checkpoint(&token, &id, Stage::SynthesizeSpeech, &mut partial) {
            return Ok(run);
        }
        let started = Instant::now();
        let synthesis = speech::spawn_synthesis(
            self.collaborators.speech.clone(),
            self.artifacts.clone(),
            translated.clone(),
            emotion.clone(),
        );
        self.stage_done(&id, Stage::SynthesizeSpeech, started);

        // S5
        if let Some(run) = self.checkpoint(&token, &id, Stage::SelectLayers, &mut partial) {
            return Ok(run);
        }
        let started = Instant::now();
        let selected = layers::select_layers(
            self.collaborators.assistant.as_ref(),
            self.settings.variant,
            &snapshot.layers,
            &reply,
        )
        .await?;
        partial.layers = Some(selected.layers.clone());
        partial.layer_history = Some(selected.history.clone());
        self.stage_done(&id, Stage::SelectLayers, started);

        // S6
        if let Some(run) = self.checkpoint(&token, &id, Stage::AwaitArtifact, &mut partial) {
            return Ok(run);
        }
        let started = Instant::now();
        let audio = match speech::await_artifact(
            synthesis,
            self.artifacts.as_ref(),
            self.settings.artifact_timeout,
            self.settings.artifact_poll,
            &token,
        )
        .await
        {
            ArtifactWait::Ready(key) => Some(key),
            ArtifactWait::Unavailable => None,
            ArtifactWait::Cancelled => {
                return Ok(self.cancelled(&id, Stage::AwaitArtifact, partial));
            }
        };
        self.stage_done(&id, Stage::AwaitArtifact, started);

        let bundle = JobBundle {
            job_id: id,
            display_text: display_text(&reply, self.settings.wrap_width),
            reply,
            translated,
            emotion,
            layers: selected.layers,
            dialogue,
            emotion_history: classified.history,
            layer_history: selected.history,
            audio,
            base_version: snapshot.version,
        };
        Ok(JobRun::Completed(Box::new(bundle)))
    }

    fn stage_done(&self, job_id: &str, stage: Stage, started: Instant) {
        let duration_ms = started.elapsed().as_millis() as u64;
        debug!(job_id, %stage, duration_ms, "Stage completed");
        self.events.publish(DomainEvent::StageCompleted {
            job_id: job_id.to_string(),
            stage: stage.to_string(),
            duration_ms,
            timestamp: Utc::now(),
        });
    }

    /// `Some` when the token is set and `stage` must not run.
    fn checkpoint(
        &self,
        token: &CancellationToken,
        job_id: &str,
        stage: Stage,
        partial: &mut PartialState,
    ) -> Option<JobRun> {
        token
            .is_cancelled()
            .then(|| self.cancelled(job_id, stage, std::mem::take(partial)))
    }

    fn cancelled(&self, job_id: &str, before: Stage, partial: PartialState) -> JobRun {
        info!(job_id, %before, "Job cancelled");
        self.events.publish(DomainEvent::JobCancelled {
            job_id: job_id.to_string(),
            before_stage: before.to_string(),
            timestamp: Utc::now(),
        });
        JobRun::Cancelled { before, partial }
    }
}
