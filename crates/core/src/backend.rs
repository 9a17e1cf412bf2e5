//! Collaborator traits: the abstraction over model backends.
//!
//! A job talks to four kinds of backend:
//! - a text generator (persona replies and every control prompt)
//! - a vision describer (what is on the owner's screen)
//! - a speech synthesizer (reference-voice TTS)
//! - a screen source (raw screenshots)
//!
//! Implementations live in `murasame-providers`; tests script them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::message::{History, Role};

/// A request to the text-generation collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The new prompt (appended by the backend with `role`)
    pub prompt: String,

    /// The History the prompt continues
    pub history: History,

    /// Role the prompt is appended under
    pub role: Role,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, history: History, role: Role) -> Self {
        Self {
            prompt: prompt.into(),
            history,
            role,
        }
    }
}

/// A backend reply: the generated text plus the History extended with the
/// prompt and the reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
    pub history: History,
}

/// A request to the vision-description collaborator.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub image: Screenshot,
    pub prompt: String,
    pub history: History,
}

/// A request to the speech-synthesis collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    /// Text to speak (already translated)
    pub text: String,

    /// Emotion label selecting the reference voice
    pub emotion: String,
}

/// An encoded screenshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
    /// Encoded image bytes
    pub bytes: Vec<u8>,

    /// MIME type of `bytes` (e.g. `image/png`)
    pub mime: String,
}

impl Screenshot {
    pub fn png(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime: "image/png".into(),
        }
    }
}

/// Text generation. Every stage of a job that needs words goes through this.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// A human-readable name for diagnostics (e.g. "persona", "assistant").
    fn name(&self) -> &str;

    /// Continue `request.history` with `request.prompt`.
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, BackendError>;
}

/// Describe an image in natural language.
#[async_trait]
pub trait VisionDescriber: Send + Sync {
    fn name(&self) -> &str;

    async fn describe(&self, request: VisionRequest) -> Result<Generation, BackendError>;
}

/// Speak text with the voice of a given emotion.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn name(&self) -> &str;

    /// Synthesize audio bytes (a complete WAV file).
    async fn synthesize(&self, request: SpeechRequest) -> Result<Vec<u8>, BackendError>;
}

/// Grab the current screen.
#[async_trait]
pub trait ScreenSource: Send + Sync {
    async fn capture(&self) -> Result<Screenshot, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Turn;

    #[test]
    fn generation_request_wire_shape() {
        let request = GenerationRequest::new("你好", History::seeded("persona"), Role::User);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["prompt"], "你好");
        assert_eq!(json["role"], "user");
        assert_eq!(json["history"][0]["role"], "system");
    }

    #[test]
    fn generation_roundtrip_keeps_history_order() {
        let mut history = History::seeded("s");
        history.push(Turn::user("u"));
        history.push(Turn::assistant("a"));
        let generation = Generation {
            text: "a".into(),
            history,
        };
        let json = serde_json::to_string(&generation).unwrap();
        let back: Generation = serde_json::from_str(&json).unwrap();
        assert_eq!(back.history.len(), 3);
        assert_eq!(back.history.last().unwrap().content, "a");
    }

    #[test]
    fn screenshot_png_sets_mime() {
        let shot = Screenshot::png(vec![0x89, b'P', b'N', b'G']);
        assert_eq!(shot.mime, "image/png");
        assert_eq!(shot.bytes.len(), 4);
    }
}
