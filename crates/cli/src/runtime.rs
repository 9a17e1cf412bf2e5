//! Wiring: configuration in, a running companion out.

use murasame_config::AppConfig;
use murasame_core::{EventBus, Persona};
use murasame_pipeline::{
    Collaborators, Coordinator, EmotionCatalog, FsArtifactStore, ModelGate, ObservationLoop,
    Pipeline, PipelineSettings, ResultSink,
};
use murasame_providers::build_from_config;
use murasame_sprite::Sprite;
use std::sync::Arc;
use tracing::warn;

pub struct Runtime {
    pub coordinator: Arc<Coordinator>,
    /// `None` when no capture command is configured
    pub observer: Option<ObservationLoop>,
}

pub fn persona(config: &AppConfig) -> Persona {
    config
        .persona
        .system_prompt_override
        .clone()
        .map(Persona::with_prompt)
        .unwrap_or_default()
}

/// Load the configured art variant. Missing assets only cost the portrait.
pub fn sprite(config: &AppConfig) -> Option<Sprite> {
    let variant = match config.sprite.variant.parse() {
        Ok(variant) => variant,
        Err(e) => {
            warn!(error = %e, "Bad sprite variant");
            return None;
        }
    };
    match Sprite::load(&config.sprite.asset_dir, variant) {
        Ok(sprite) => Some(sprite),
        Err(e) => {
            warn!(error = %e, "Portrait assets unavailable");
            None
        }
    }
}

pub fn build(
    config: &AppConfig,
    sink: Arc<dyn ResultSink>,
) -> Result<Runtime, Box<dyn std::error::Error>> {
    let backends = build_from_config(config);
    let settings = PipelineSettings::from_config(config)?;
    let artifacts = Arc::new(FsArtifactStore::open(&config.speech.artifact_dir)?);
    let emotions = EmotionCatalog::new(backends.emotion_labels, &config.pipeline.default_emotion);

    let pipeline = Arc::new(Pipeline::new(
        Collaborators {
            persona: backends.persona,
            assistant: backends.assistant.clone(),
            speech: backends.speech,
        },
        artifacts,
        emotions,
        settings,
        Arc::new(EventBus::default()),
    ));

    let coordinator = Arc::new(
        Coordinator::with_sink(pipeline, persona(config), sink)
            .with_capture(config.observation.enabled),
    );

    let observer = backends.screen.map(|screen| {
        ObservationLoop::new(
            coordinator.clone(),
            screen,
            backends.vision,
            Arc::new(ModelGate::new(backends.assistant)),
            config.observation.interval(),
        )
    });

    Ok(Runtime {
        coordinator,
        observer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use murasame_pipeline::JobBundle;

    struct Discard;

    #[async_trait]
    impl ResultSink for Discard {
        async fn apply(&self, _bundle: &JobBundle) {}
    }

    #[test]
    fn persona_override() {
        let mut config = AppConfig::default();
        assert_eq!(persona(&config).system_prompt, Persona::default().system_prompt);

        config.persona.system_prompt_override = Some("你是一只猫".into());
        assert_eq!(persona(&config).system_prompt, "你是一只猫");
    }

    #[test]
    fn missing_assets_cost_only_the_portrait() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.sprite.asset_dir = dir.path().join("nowhere");
        assert!(sprite(&config).is_none());

        config.sprite.variant = "z".into();
        assert!(sprite(&config).is_none());
    }

    #[tokio::test]
    async fn build_without_capture_command() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.speech.artifact_dir = dir.path().join("voices");
        config.speech.reference_dir = dir.path().join("refs");
        config.observation.capture_command.clear();

        let runtime = build(&config, Arc::new(Discard)).unwrap();
        assert!(runtime.observer.is_none());
        assert!(!runtime.coordinator.capture_enabled());
        assert!(dir.path().join("voices").is_dir());
        assert_eq!(runtime.coordinator.snapshot().await.dialogue.len(), 1);
    }

    #[test]
    fn bad_variant_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.speech.artifact_dir = dir.path().join("voices");
        config.sprite.variant = "c".into();
        assert!(build(&config, Arc::new(Discard)).is_err());
    }
}
