//! Speech synthesis through a GPT-SoVITS `/tts` server.
//!
//! Each emotion label names a directory of reference voices:
//!
//! ```text
//! reference_voices/
//!   平静/
//!     asr.txt        transcript of the sample
//!     sample.wav
//!   高兴/
//!     ...
//! ```
//!
//! The first audio file (sorted by name) is the reference, `asr.txt` its
//! transcript.

use async_trait::async_trait;
use murasame_core::{BackendError, SpeechRequest, SpeechSynthesizer};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::http;

const TRANSCRIPT_FILE: &str = "asr.txt";

/// The reference voice directory.
#[derive(Debug, Clone)]
pub struct ReferenceVoices {
    root: PathBuf,
    labels: Vec<String>,
}

/// One emotion's reference sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceVoice {
    pub audio_path: PathBuf,
    pub transcript: String,
}

impl ReferenceVoices {
    /// Scan `root` for emotion directories. Labels come back sorted.
    pub fn scan(root: impl Into<PathBuf>) -> Result<Self, BackendError> {
        let root = root.into();
        let entries = std::fs::read_dir(&root)
            .map_err(|e| BackendError::Io(format!("{}: {e}", root.display())))?;

        let mut labels: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        labels.sort();

        debug!(root = %root.display(), count = labels.len(), "Scanned reference voices");
        Ok(Self { root, labels })
    }

    /// A voice set with no labels; every resolve fails.
    pub fn empty(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            labels: Vec::new(),
        }
    }

    /// Emotion labels available for synthesis.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Find the reference sample and transcript for `emotion`.
    pub async fn resolve(&self, emotion: &str) -> Result<ReferenceVoice, BackendError> {
        if !self.labels.iter().any(|label| label == emotion) {
            return Err(BackendError::NotConfigured(format!(
                "no reference voice for emotion '{emotion}'"
            )));
        }

        let dir = self.root.join(emotion);
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| BackendError::Io(format!("{}: {e}", dir.display())))?;

        let mut samples = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| BackendError::Io(e.to_string()))?
        {
            let name = entry.file_name();
            if name != TRANSCRIPT_FILE && entry.file_type().await.is_ok_and(|t| t.is_file()) {
                samples.push(entry.path());
            }
        }
        samples.sort();

        let sample = samples.into_iter().next().ok_or_else(|| {
            BackendError::NotConfigured(format!("no audio sample in {}", dir.display()))
        })?;

        let transcript_path = dir.join(TRANSCRIPT_FILE);
        let transcript = tokio::fs::read_to_string(&transcript_path)
            .await
            .map_err(|e| BackendError::Io(format!("{}: {e}", transcript_path.display())))?;

        // The server resolves paths relative to its own working directory.
        let audio_path = tokio::fs::canonicalize(&sample).await.unwrap_or(sample);

        Ok(ReferenceVoice {
            audio_path,
            transcript: transcript.trim().to_string(),
        })
    }
}

/// A GPT-SoVITS speech backend.
pub struct SovitsSynthesizer {
    url: String,
    voices: ReferenceVoices,
    client: reqwest::Client,
}

impl SovitsSynthesizer {
    pub fn new(url: impl Into<String>, voices: ReferenceVoices, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            voices,
            client: http::client(timeout),
        }
    }

    pub fn voices(&self) -> &ReferenceVoices {
        &self.voices
    }
}

#[async_trait]
impl SpeechSynthesizer for SovitsSynthesizer {
    fn name(&self) -> &str {
        "sovits"
    }

    async fn synthesize(&self, request: SpeechRequest) -> Result<Vec<u8>, BackendError> {
        let voice = self.voices.resolve(&request.emotion).await?;
        let params = TtsParams::new(&request.text, &voice);

        debug!(emotion = %request.emotion, reference = %voice.audio_path.display(), "Sending TTS request");

        let response = self
            .client
            .post(&self.url)
            .json(&params)
            .send()
            .await
            .map_err(http::send_error)?;
        let response = http::check_status("sovits", response).await?;
        let audio = response.bytes().await.map_err(http::send_error)?;

        if audio.is_empty() {
            warn!(emotion = %request.emotion, "TTS server returned an empty body");
            return Err(BackendError::malformed("sovits", "empty audio body"));
        }
        Ok(audio.to_vec())
    }
}

// --- TTS API types (internal) ---

#[derive(Debug, Serialize)]
struct TtsParams<'a> {
    text: &'a str,
    text_lang: &'static str,
    ref_audio_path: String,
    aux_ref_audio_paths: Vec<String>,
    prompt_text: &'a str,
    prompt_lang: &'static str,
    top_k: u32,
    top_p: f64,
    temperature: f64,
    text_split_method: &'static str,
    batch_size: u32,
    batch_threshold: f64,
    split_bucket: bool,
    speed_factor: f64,
    streaming_mode: bool,
    seed: i64,
    parallel_infer: bool,
    repetition_penalty: f64,
    sample_steps: u32,
    super_sampling: bool,
}

impl<'a> TtsParams<'a> {
    fn new(text: &'a str, voice: &'a ReferenceVoice) -> Self {
        Self {
            text,
            text_lang: "ja",
            ref_audio_path: voice.audio_path.to_string_lossy().into_owned(),
            aux_ref_audio_paths: Vec::new(),
            prompt_text: &voice.transcript,
            prompt_lang: "ja",
            top_k: 15,
            top_p: 1.0,
            temperature: 1.0,
            text_split_method: "cut1",
            batch_size: 1,
            batch_threshold: 0.75,
            split_bucket: true,
            speed_factor: 1.0,
            streaming_mode: false,
            seed: -1,
            parallel_infer: true,
            repetition_penalty: 1.35,
            sample_steps: 32,
            super_sampling: false,
        }
    }
}
