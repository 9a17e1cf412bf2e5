//! Jobs, stages, and what a job leaves behind.

use murasame_core::{HEAD_PAT_TRIGGER, History, Role};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio_util::sync::CancellationToken;

use crate::artifact::ArtifactKey;
use crate::session::SessionSnapshot;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Annotate,
    Generate,
    Translate,
    ClassifyEmotion,
    SynthesizeSpeech,
    SelectLayers,
    AwaitArtifact,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Annotate => "annotate",
            Self::Generate => "generate",
            Self::Translate => "translate",
            Self::ClassifyEmotion => "classify_emotion",
            Self::SynthesizeSpeech => "synthesize_speech",
            Self::SelectLayers => "select_layers",
            Self::AwaitArtifact => "await_artifact",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What started a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub text: String,
    pub role: Role,
}

impl Trigger {
    /// The owner typed something.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            role: Role::User,
        }
    }

    /// The observation loop noticed a change on screen.
    pub fn observation(description: impl Into<String>) -> Self {
        Self {
            text: description.into(),
            role: Role::System,
        }
    }

    /// The owner patted the companion's head.
    pub fn head_pat() -> Self {
        Self {
            text: HEAD_PAT_TRIGGER.into(),
            role: Role::System,
        }
    }
}

/// One run of the pipeline. Created per trigger, never persisted.
#[derive(Debug)]
pub struct PipelineJob {
    pub id: String,
    pub trigger: Trigger,
    pub snapshot: SessionSnapshot,
    pub token: CancellationToken,
}

impl PipelineJob {
    pub fn new(trigger: Trigger, snapshot: SessionSnapshot, token: CancellationToken) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            trigger,
            snapshot,
            token,
        }
    }
}

/// Stage outputs collected so far. Job-local: nothing here reaches the
/// session unless the job completes.
#[derive(Debug, Clone, Default)]
pub struct PartialState {
    /// Dialogue with the trigger and reply appended (after S1)
    pub dialogue: Option<History>,
    pub reply: Option<String>,
    pub translated: Option<String>,
    pub emotion: Option<String>,
    pub emotion_history: Option<History>,
    pub layers: Option<Vec<u32>>,
    pub layer_history: Option<History>,
    pub audio: Option<ArtifactKey>,
}

/// Everything a completed job emits.
#[derive(Debug, Clone)]
pub struct JobBundle {
    pub job_id: String,

    /// Reply wrapped and quoted for the speech bubble
    pub display_text: String,

    /// Reply as generated
    pub reply: String,

    pub translated: String,
    pub emotion: String,
    pub layers: Vec<u32>,

    pub dialogue: History,
    pub emotion_history: History,
    pub layer_history: History,

    /// Synthesized speech, when synthesis finished in time
    pub audio: Option<ArtifactKey>,

    /// Session version the job started from
    pub base_version: u64,
}

/// How a pipeline run ended, short of an error.
#[derive(Debug)]
pub enum JobRun {
    Completed(Box<JobBundle>),

    /// The token was set; `before` is the stage that did not run.
    Cancelled { before: Stage, partial: PartialState },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names() {
        assert_eq!(Stage::ClassifyEmotion.to_string(), "classify_emotion");
        assert_eq!(
            serde_json::to_string(&Stage::AwaitArtifact).unwrap(),
            "\"await_artifact\""
        );
    }

    #[test]
    fn stages_are_ordered() {
        assert!(Stage::Annotate < Stage::Generate);
        assert!(Stage::SelectLayers < Stage::AwaitArtifact);
    }

    #[test]
    fn trigger_roles() {
        assert_eq!(Trigger::user("你好").role, Role::User);
        assert_eq!(Trigger::observation("打开了浏览器").role, Role::System);
        let pat = Trigger::head_pat();
        assert_eq!(pat.role, Role::System);
        assert_eq!(pat.text, HEAD_PAT_TRIGGER);
    }
}
