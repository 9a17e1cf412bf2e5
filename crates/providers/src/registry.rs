//! Builds the backend set from configuration.

use murasame_config::AppConfig;
use murasame_core::{ScreenSource, SpeechSynthesizer, TextGenerator, VisionDescriber};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::{ChatEndpoint, CommandScreenSource, OpenAiVision, ReferenceVoices, SovitsSynthesizer};

/// Every backend a running companion needs.
pub struct Backends {
    /// Persona model: produces the companion's replies
    pub persona: Arc<dyn TextGenerator>,

    /// General assistant: translation, emotion, layers, gating
    pub assistant: Arc<dyn TextGenerator>,

    pub vision: Arc<dyn VisionDescriber>,

    pub speech: Arc<dyn SpeechSynthesizer>,

    /// `None` when the capture command is not configured
    pub screen: Option<Arc<dyn ScreenSource>>,

    /// Labels found in the reference voice directory (may be empty)
    pub emotion_labels: Vec<String>,
}

/// Build backends from configuration.
///
/// A missing reference voice directory is not fatal: speech requests will
/// fail and the pipeline continues without audio.
pub fn build_from_config(config: &AppConfig) -> Backends {
    let endpoints = &config.endpoints;
    let timeout = Duration::from_secs(endpoints.request_timeout_secs);

    let voices = match ReferenceVoices::scan(&config.speech.reference_dir) {
        Ok(voices) => voices,
        Err(e) => {
            warn!(error = %e, "Reference voices unavailable");
            ReferenceVoices::empty(&config.speech.reference_dir)
        }
    };
    let emotion_labels = voices.labels().to_vec();

    let screen: Option<Arc<dyn ScreenSource>> =
        match CommandScreenSource::from_argv(&config.observation.capture_command) {
            Ok(source) => Some(Arc::new(source)),
            Err(e) => {
                warn!(error = %e, "Screen capture unavailable");
                None
            }
        };

    Backends {
        persona: Arc::new(ChatEndpoint::new(
            "persona",
            &endpoints.chat_url,
            &endpoints.model_id,
            timeout,
        )),
        assistant: Arc::new(ChatEndpoint::new(
            "assistant",
            &endpoints.assistant_url,
            &endpoints.model_id,
            timeout,
        )),
        vision: Arc::new(OpenAiVision::new(
            &endpoints.vision_url,
            &endpoints.vision_model,
            endpoints.api_key.clone(),
            timeout,
        )),
        speech: Arc::new(SovitsSynthesizer::new(&endpoints.speech_url, voices, timeout)),
        screen,
        emotion_labels,
    }
}
