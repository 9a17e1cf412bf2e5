//! The observation loop: look at the screen now and then, and let the
//! companion comment when something worth telling happens.
//!
//! One cycle captures the screen, has the vision model describe it, asks
//! the gate whether the description is news, and if so submits an
//! observation job and waits for it. The loop never has more than one job
//! of its own in flight, and sleeps a full period after each cycle.

use chrono::Utc;
use murasame_core::{DomainEvent, History, ScreenSource, VisionDescriber, VisionRequest};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::coordinator::{Coordinator, JobOutcome};
use crate::gating::{GateDecision, GatingPolicy};

/// The question put to the vision model with every screenshot.
pub const OBSERVE_PROMPT: &str = "现在请描述用户此时的行为";

#[derive(Debug)]
pub enum CycleOutcome {
    /// Capture was disabled
    Skipped,

    /// Nothing worth telling, or the coordinator was busy
    NoChange,

    /// A job ran; this is how it ended
    Triggered(JobOutcome),

    /// Capture, description or gating failed
    Failed(String),
}

pub struct ObservationLoop {
    coordinator: Arc<Coordinator>,
    screen: Arc<dyn ScreenSource>,
    vision: Arc<dyn VisionDescriber>,
    gate: Arc<dyn GatingPolicy>,
    interval: Duration,
}

impl ObservationLoop {
    pub fn new(
        coordinator: Arc<Coordinator>,
        screen: Arc<dyn ScreenSource>,
        vision: Arc<dyn VisionDescriber>,
        gate: Arc<dyn GatingPolicy>,
        interval: Duration,
    ) -> Self {
        Self {
            coordinator,
            screen,
            vision,
            gate,
            interval,
        }
    }

    /// Run until `shutdown` is cancelled. Stopping also disables capture,
    /// which cancels an observation job still in flight.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_secs = self.interval.as_secs(), "Observation loop started");
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.interval) => {}
                }
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    outcome = self.run_cycle() => {
                        debug!(?outcome, "Observation cycle finished");
                    }
                }
            }
            self.coordinator.set_capture(false);
            info!("Observation loop stopped");
        })
    }

    /// One capture, describe, gate and (maybe) job.
    pub async fn run_cycle(&self) -> CycleOutcome {
        if !self.coordinator.capture_enabled() {
            return CycleOutcome::Skipped;
        }

        let screenshot = match self.screen.capture().await {
            Ok(shot) => shot,
            Err(e) => {
                warn!(error = %e, "Screen capture failed");
                return CycleOutcome::Failed(e.to_string());
            }
        };

        let description = match self
            .vision
            .describe(VisionRequest {
                image: screenshot,
                prompt: OBSERVE_PROMPT.into(),
                history: History::new(),
            })
            .await
        {
            Ok(generation) => generation.text,
            Err(e) => {
                warn!(vision = self.vision.name(), error = %e, "Screen description failed");
                return CycleOutcome::Failed(e.to_string());
            }
        };
        debug!(%description, "Screen described");

        let decision = match self.gate.judge(&description).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(error = %e, "Gating failed");
                return CycleOutcome::Failed(e.to_string());
            }
        };
        self.coordinator.events().publish(DomainEvent::ObservationGated {
            reportable: matches!(decision, GateDecision::Report(_)),
            timestamp: Utc::now(),
        });

        let GateDecision::Report(change) = decision else {
            return CycleOutcome::NoChange;
        };
        info!(%change, "Reporting screen change");
        match self.coordinator.submit_observation(change).await {
            Some(handle) => CycleOutcome::Triggered(handle.wait().await),
            None => CycleOutcome::NoChange,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::MemoryArtifactStore;
    use crate::gating::ModelGate;
    use crate::pipeline::{Collaborators, Pipeline, PipelineSettings};
    use crate::stages::emotion::EmotionCatalog;
    use crate::test_helpers::{
        CannedAssistant, EchoGenerator, RecordingSynthesizer, ScriptedGenerator, ScriptedVision,
        StaticScreen, reply,
    };
    use murasame_core::{EventBus, Persona, Role, TextGenerator};

    fn coordinator() -> Arc<Coordinator> {
        coordinator_with(Arc::new(EchoGenerator::new()))
    }

    fn coordinator_with(persona: Arc<dyn TextGenerator>) -> Arc<Coordinator> {
        let pipeline = Pipeline::new(
            Collaborators {
                persona,
                assistant: Arc::new(CannedAssistant),
                speech: Arc::new(RecordingSynthesizer::new()),
            },
            Arc::new(MemoryArtifactStore::new()),
            EmotionCatalog::new(Vec::new(), "平静"),
            PipelineSettings::default(),
            Arc::new(EventBus::default()),
        );
        Arc::new(Coordinator::new(Arc::new(pipeline), Persona::default()).with_capture(true))
    }

    fn observation(
        coordinator: Arc<Coordinator>,
        descriptions: &[&str],
        gate: Vec<crate::test_helpers::Scripted>,
    ) -> (ObservationLoop, Arc<ScriptedGenerator>) {
        let gate_model = Arc::new(ScriptedGenerator::new(gate));
        let observer = ObservationLoop::new(
            coordinator,
            Arc::new(StaticScreen),
            Arc::new(ScriptedVision::new(descriptions)),
            Arc::new(ModelGate::new(gate_model.clone())),
            Duration::from_secs(30),
        );
        (observer, gate_model)
    }

    #[tokio::test]
    async fn reportable_change_runs_one_system_job() {
        let coordinator = coordinator();
        let (observer, _) = observation(
            coordinator.clone(),
            &["用户打开了一个恐怖游戏"],
            vec![reply(r#"{"des": "用户开始玩恐怖游戏"}"#)],
        );

        let CycleOutcome::Triggered(JobOutcome::Completed(bundle)) = observer.run_cycle().await
        else {
            panic!("expected a completed observation job");
        };
        let trigger = &bundle.dialogue.turns()[1];
        assert_eq!(trigger.role, Role::System);
        assert_eq!(trigger.content, "用户开始玩恐怖游戏");
        assert_eq!(coordinator.snapshot().await.version, 1);
    }

    #[tokio::test]
    async fn unchanged_scene_skips_job() {
        let coordinator = coordinator();
        let (observer, gate_model) = observation(
            coordinator.clone(),
            &["用户在写代码", "用户在写代码"],
            vec![reply(r#"{"des": null}"#)],
        );

        assert!(matches!(observer.run_cycle().await, CycleOutcome::NoChange));
        assert!(matches!(observer.run_cycle().await, CycleOutcome::NoChange));
        assert_eq!(gate_model.calls(), 1);
        assert_eq!(coordinator.snapshot().await.version, 0);
    }

    #[tokio::test]
    async fn disabled_capture_skips_everything() {
        let coordinator = coordinator();
        coordinator.focus_gained();
        let (observer, gate_model) = observation(coordinator, &[], vec![]);

        assert!(matches!(observer.run_cycle().await, CycleOutcome::Skipped));
        assert_eq!(gate_model.calls(), 0);
    }

    #[tokio::test]
    async fn vision_failure_is_reported() {
        let (observer, _) = observation(coordinator(), &[], vec![]);
        assert!(matches!(observer.run_cycle().await, CycleOutcome::Failed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_loop_stops_on_shutdown() {
        let coordinator = coordinator();
        let (observer, gate_model) = observation(
            coordinator.clone(),
            &["用户在看视频"],
            vec![reply(r#"{"des": null}"#)],
        );
        let shutdown = CancellationToken::new();
        let handle = observer.spawn(shutdown.clone());

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(gate_model.calls(), 1);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_job_in_flight() {
        let persona = Arc::new(EchoGenerator::new().with_delay(Duration::from_secs(5)));
        let coordinator = coordinator_with(persona.clone());
        let (observer, _) = observation(
            coordinator.clone(),
            &["用户打开了一个恐怖游戏"],
            vec![reply(r#"{"des": "用户开始玩恐怖游戏"}"#)],
        );
        let mut events = coordinator.events().subscribe();
        let shutdown = CancellationToken::new();
        let handle = observer.spawn(shutdown.clone());

        // The cycle starts at 30s; its job is still generating at 32s.
        tokio::time::sleep(Duration::from_secs(32)).await;
        assert!(coordinator.busy());
        shutdown.cancel();
        handle.await.unwrap();
        assert!(!coordinator.capture_enabled());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(persona.calls(), 1);
        assert!(!coordinator.busy());
        assert_eq!(coordinator.snapshot().await.version, 0);

        let mut cancelled = false;
        while let Ok(event) = events.try_recv() {
            assert!(!matches!(event.as_ref(), DomainEvent::JobCompleted { .. }));
            cancelled |= matches!(event.as_ref(), DomainEvent::JobCancelled { .. });
        }
        assert!(cancelled);
    }
}
