//! Scripted collaborators for unit tests.

use async_trait::async_trait;
use murasame_core::{
    BackendError, Generation, GenerationRequest, History, ScreenSource, Screenshot, SpeechRequest,
    SpeechSynthesizer, TextGenerator, Turn, VisionDescriber, VisionRequest,
};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub type Scripted = Result<String, BackendError>;

pub fn reply(text: &str) -> Scripted {
    Ok(text.to_string())
}

/// What a chat backend sends back: the request history extended with the
/// prompt and the reply.
fn extend(request: &GenerationRequest, text: &str) -> History {
    let mut turns = request.history.turns().to_vec();
    turns.push(Turn::new(request.role, request.prompt.clone()));
    turns.push(Turn::assistant(text));
    History::from_turns(turns).unwrap_or_default()
}

/// Returns scripted replies in order. Panics when the script runs out.
pub struct ScriptedGenerator {
    script: Mutex<Vec<Scripted>>,
    requests: Mutex<Vec<GenerationRequest>>,
    cancel: Option<(usize, CancellationToken)>,
}

impl ScriptedGenerator {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script),
            requests: Mutex::new(Vec::new()),
            cancel: None,
        }
    }

    /// Set `token` once call number `call` (1-based) has produced its reply.
    pub fn cancel_after(mut self, call: usize, token: CancellationToken) -> Self {
        self.cancel = Some((call, token));
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<Generation, BackendError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };
        let scripted = {
            let script = self.script.lock().unwrap();
            assert!(
                call <= script.len(),
                "ScriptedGenerator: no more responses (call #{call}, have {})",
                script.len()
            );
            script[call - 1].clone()
        };

        if let Some((at, token)) = &self.cancel {
            if *at == call {
                token.cancel();
            }
        }

        let text = scripted?;
        Ok(Generation {
            history: extend(&request, &text),
            text,
        })
    }
}

/// Records requests and returns a fixed WAV header, optionally after a delay.
pub struct RecordingSynthesizer {
    requests: Mutex<Vec<SpeechRequest>>,
    failure: Option<BackendError>,
    delay: Duration,
}

impl RecordingSynthesizer {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            failure: None,
            delay: Duration::ZERO,
        }
    }

    pub fn failing(error: BackendError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<SpeechRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for RecordingSynthesizer {
    fn name(&self) -> &str {
        "recording"
    }

    async fn synthesize(&self, request: SpeechRequest) -> Result<Vec<u8>, BackendError> {
        self.requests.lock().unwrap().push(request);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.failure {
            Some(e) => Err(e.clone()),
            None => Ok(b"RIFF\0\0\0\0WAVE".to_vec()),
        }
    }
}

/// Describes every screenshot with the next scripted description.
pub struct ScriptedVision {
    descriptions: Mutex<Vec<String>>,
}

impl ScriptedVision {
    pub fn new(descriptions: &[&str]) -> Self {
        Self {
            descriptions: Mutex::new(descriptions.iter().rev().map(|d| d.to_string()).collect()),
        }
    }
}

#[async_trait]
impl VisionDescriber for ScriptedVision {
    fn name(&self) -> &str {
        "scripted-vision"
    }

    async fn describe(&self, request: VisionRequest) -> Result<Generation, BackendError> {
        let text = self
            .descriptions
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| BackendError::Network("vision script exhausted".into()))?;
        let mut history = request.history;
        history.ensure_seed("vision");
        history.push(Turn::user(request.prompt));
        history.push(Turn::assistant(text.clone()));
        Ok(Generation { text, history })
    }
}

/// Always returns the same tiny PNG.
pub struct StaticScreen;

#[async_trait]
impl ScreenSource for StaticScreen {
    async fn capture(&self) -> Result<Screenshot, BackendError> {
        Ok(Screenshot::png(b"\x89PNG\r\n\x1a\n".to_vec()))
    }
}

/// Persona stand-in that answers every prompt with a fresh line, after an
/// optional delay.
pub struct EchoGenerator {
    calls: Mutex<usize>,
    delay: Duration,
}

impl EchoGenerator {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(0),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl TextGenerator for EchoGenerator {
    fn name(&self) -> &str {
        "echo"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<Generation, BackendError> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            *calls
        };
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let text = format!("本座听到了第{n}句：{}", request.prompt);
        Ok(Generation {
            history: extend(&request, &text),
            text,
        })
    }
}

/// Assistant stand-in that answers each control channel from its seed
/// prompt: translation, emotion, otherwise a layer list.
pub struct CannedAssistant;

#[async_trait]
impl TextGenerator for CannedAssistant {
    fn name(&self) -> &str {
        "canned"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<Generation, BackendError> {
        let seed = request
            .history
            .first()
            .map(|turn| turn.content.clone())
            .unwrap_or_default();
        let text = if seed.contains("翻译助手") {
            "ご主人、吾輩はここにおるぞ"
        } else if seed.contains("情感分析助手") {
            "平静"
        } else {
            "[1717, 1475, 1261]"
        };
        Ok(Generation {
            history: extend(&request, text),
            text: text.to_string(),
        })
    }
}
