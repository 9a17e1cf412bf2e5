//! Scene gating: is what the owner is doing now worth telling the companion?
//!
//! The gate keeps its own rolling History so the model can compare the new
//! description with what it saw before. Two structurally identical
//! descriptions in a row never reach the model.

use async_trait::async_trait;
use murasame_core::{BackendError, History, TextGenerator};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::stages::ask;

/// System prompt of the gating assistant.
pub const GATE_PROMPT: &str = concat!(
    "你现在是一个思考助手，来协助一个AI丛雨桌宠工作。你需要根据我提供给你的屏幕描述，来思考这段描述是否有必要提供给AI桌宠进行处理。",
    "若你根据上下文推断用户的行为此时没有发生大的变化，那么请你选择不给AI桌宠提供。若用户正在操作的软件或者是进行了什么很重要的操作，那么请你选择提供给AI桌宠。\n",
    "若用户行为发生了变化，且你要提供给AI桌宠，那么你需要详细描述用户的行为变化，说明用户具体做了什么操作，但是描述要尽可能精练，不要太长。\n",
    "这个桌宠是一个绿色头发的小女孩，名叫丛雨，你应该可以在屏幕上看到她的形象。\n",
    "若你觉得不需要提供给AI桌宠，那么请回复一个JSON {\"des\": null}。若你觉得需要提供，那么请回复一个JSON {\"des\": \"具体描述内容以及进行的操作\"}",
);

/// Turns kept after the seed in the gate's History.
const MAX_GATE_TURNS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    NoChange,
    /// A concise description of what changed
    Report(String),
}

#[async_trait]
pub trait GatingPolicy: Send + Sync {
    async fn judge(&self, description: &str) -> Result<GateDecision, BackendError>;
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct GateReply {
    #[serde(deserialize_with = "Option::deserialize")]
    des: Option<String>,
}

/// Decode the gate's answer. The `des` key is required; its value is null or
/// a string.
pub fn parse_gate_reply(text: &str) -> Result<GateDecision, BackendError> {
    let reply: GateReply = serde_json::from_str(text.trim())
        .map_err(|e| BackendError::malformed("assistant", format!("gate reply: {e}")))?;
    Ok(match reply.des.map(|d| d.trim().to_string()) {
        Some(des) if !des.is_empty() => GateDecision::Report(des),
        _ => GateDecision::NoChange,
    })
}

fn normalize(description: &str) -> String {
    description.split_whitespace().collect::<Vec<_>>().join(" ")
}

struct GateState {
    history: History,
    last: Option<String>,
}

/// A gate backed by the assistant model.
pub struct ModelGate {
    assistant: Arc<dyn TextGenerator>,
    state: Mutex<GateState>,
}

impl ModelGate {
    pub fn new(assistant: Arc<dyn TextGenerator>) -> Self {
        Self {
            assistant,
            state: Mutex::new(GateState {
                history: History::seeded(GATE_PROMPT),
                last: None,
            }),
        }
    }

    /// Number of turns in the rolling History, seed included.
    pub async fn history_len(&self) -> usize {
        self.state.lock().await.history.len()
    }
}

#[async_trait]
impl GatingPolicy for ModelGate {
    async fn judge(&self, description: &str) -> Result<GateDecision, BackendError> {
        let normalized = normalize(description);
        let mut state = self.state.lock().await;
        if state.last.as_deref() == Some(normalized.as_str()) {
            debug!("Scene unchanged, gate skipped");
            return Ok(GateDecision::NoChange);
        }

        let mut history = state.history.clone();
        history.ensure_seed(GATE_PROMPT);
        let prompt = format!(
            "描述：'''{description}'''若你希望提供给AI桌宠进行处理，那么请确保这条描述与之前我提供的描述有很大不同，否则请不要提供来浪费我的资源。"
        );
        let (answer, history) = ask(self.assistant.as_ref(), history, &prompt).await?;

        state.history = trim(history);
        state.last = Some(normalized);
        parse_gate_reply(&answer)
    }
}

fn trim(history: History) -> History {
    let turns = history.turns();
    if turns.len() <= MAX_GATE_TURNS + 1 {
        return history;
    }
    let mut kept = Vec::with_capacity(MAX_GATE_TURNS + 1);
    kept.push(turns[0].clone());
    kept.extend_from_slice(&turns[turns.len() - MAX_GATE_TURNS..]);
    History::from_turns(kept).unwrap_or(history)
}
