//! Persona: the companion's character and the conventions shared by every
//! prompt sent on her behalf.
//!
//! The persona turn seeds the dialogue History. Control prompts (translation,
//! emotion, layer selection, scene gating) carry [`NO_THINK_MARKER`] so the
//! backend skips extended reasoning, and their replies go through
//! [`strip_reasoning`] before they are parsed.

use serde::{Deserialize, Serialize};

use crate::message::History;

/// Inline marker asking the backend not to produce a reasoning block.
pub const NO_THINK_MARKER: &str = "/no_think";

/// Closing tag of a reasoning block in a model reply.
const THINK_CLOSE: &str = "</think>";

/// System-role trigger raised when the owner pats the companion's head.
pub const HEAD_PAT_TRIGGER: &str = "主人摸了摸你的头";

/// Default persona prompt.
const PERSONA_PROMPT: &str = concat!(
    "你叫丛雨，是一个16岁的小女孩，是寄宿在建实神社神刀上的女孩，活了500多年，数百年前还是普通的人类。",
    "你原本的名字是“绫”。罹患了肺炎和其它并发症，作为祭品成为神刀的“管理者”。",
    "你的身材娇小，胸部平坦，碰上去“很硬”。有着飘逸的绿色长发，头发两侧用浅蓝色绳结绑了起来。",
    "你在对话中只以“本座”称呼自己。用户是你的主人和恋人，你会称呼用户为“主人”。",
    "你平常是个很活泼开朗的女孩子，言行很孩子气，但是偶尔也有一些老成的发言。",
    "是个爱撒娇的女孩子，被主人摸头就会瞬间变得羞涩起来，即便当时还在发着牢骚。",
    "有时会开玩笑，贱兮兮的，还会坏笑。你不喜欢主人称呼你为“幼刀”，“钝刀”，“锉刀”，“幽灵”。",
    "听到主人说你是“飞机场”，“搓衣板”一类的东西会生气。你害怕幽灵，鬼一类的东西。",
    "你喜欢吃甜食，特别是芭菲、布丁。请注意，你的回答不要过长，回答不得超过三句话。",
);

/// The companion's character sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    /// Name shown above the companion's lines
    pub display_name: String,

    /// The seed system prompt
    pub system_prompt: String,
}

impl Persona {
    /// Use a custom system prompt instead of the built-in one.
    pub fn with_prompt(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            ..Self::default()
        }
    }

    /// A single-turn History holding the persona.
    pub fn history(&self) -> History {
        History::seeded(&self.system_prompt)
    }
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            display_name: "丛雨".into(),
            system_prompt: PERSONA_PROMPT.into(),
        }
    }
}

/// The canonical single-turn persona History.
pub fn identity() -> History {
    Persona::default().history()
}

/// Append the no-reasoning marker to a control prompt.
pub fn control_prompt(prompt: &str) -> String {
    format!("{prompt}{NO_THINK_MARKER}")
}

/// Drop everything up to and including the last `</think>`, then trim.
pub fn strip_reasoning(reply: &str) -> &str {
    match reply.rfind(THINK_CLOSE) {
        Some(idx) => reply[idx + THINK_CLOSE.len()..].trim(),
        None => reply.trim(),
    }
}

/// Wrap a line for the speech bubble and quote it 「…」.
///
/// Wrapping counts characters, so CJK text breaks every `width` glyphs.
pub fn display_text(reply: &str, width: usize) -> String {
    let width = width.max(1);
    let chars: Vec<char> = reply.trim().chars().collect();
    let lines: Vec<String> = chars
        .chunks(width)
        .map(|chunk| chunk.iter().collect())
        .collect();
    format!("「{}」", lines.join("\n"))
}
