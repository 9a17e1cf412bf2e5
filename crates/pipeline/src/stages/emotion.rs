//! S3: classify the exchange into one emotion label.
//!
//! The label set is the set of reference-voice directories. An answer
//! outside the set is replaced by the default label.

use murasame_core::{History, TextGenerator};
use tracing::warn;

use crate::error::PipelineError;
use crate::job::Stage;

/// The labels the classifier may answer with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmotionCatalog {
    labels: Vec<String>,
    default: String,
}

impl EmotionCatalog {
    /// Build a catalog; `default` is added to `labels` if missing.
    pub fn new(labels: impl IntoIterator<Item = String>, default: impl Into<String>) -> Self {
        let default = default.into();
        let mut labels: Vec<String> = labels.into_iter().collect();
        if !labels.contains(&default) {
            labels.push(default.clone());
        }
        Self { labels, default }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn default_label(&self) -> &str {
        &self.default
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// The classifier's system prompt.
    pub fn prompt(&self) -> String {
        format!(
            "你是一个情感分析助手，负责分析“丛雨”说的话的情感。你现在需要将用户输入的句子进行分析，综合用户的输入和丛雨的输出返回一个丛雨情感的标签。所有供你参考的标签有{}。你需要直接返回情感标签，不需要其他任何内容。",
            self.labels.join("，")
        )
    }

    /// Map a raw answer onto the label set. The flag is true when the
    /// default was substituted.
    pub fn resolve(&self, raw: &str) -> (String, bool) {
        let raw = raw.trim();
        if self.contains(raw) {
            (raw.to_string(), false)
        } else {
            (self.default.clone(), true)
        }
    }
}

/// Result of S3.
#[derive(Debug, Clone)]
pub(crate) struct Classified {
    pub label: String,
    /// What the classifier said, when it was replaced by the default
    pub rejected: Option<String>,
    pub history: History,
}

pub(crate) async fn classify(
    assistant: &dyn TextGenerator,
    catalog: &EmotionCatalog,
    history: &History,
    trigger: &str,
    reply: &str,
) -> Result<Classified, PipelineError> {
    let mut history = history.clone();
    history.ensure_seed(&catalog.prompt());

    let prompt = format!("用户：{trigger}\n丛雨：{reply}");
    let (raw, history) = super::ask(assistant, history, &prompt)
        .await
        .map_err(|e| PipelineError::backend(Stage::ClassifyEmotion, e))?;

    let (label, fell_back) = catalog.resolve(&raw);
    if fell_back {
        warn!(returned = %raw, substituted = %label, "Emotion outside the label set");
    }
    Ok(Classified {
        label,
        rejected: fell_back.then_some(raw),
        history,
    })
}
