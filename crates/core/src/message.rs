//! Turn and History domain types.
//!
//! These are the value objects that flow through every stage of a job:
//! the foreground surface raises a trigger → the pipeline sends a History to a
//! backend → the backend answers with text and an extended History.

use serde::{Deserialize, Serialize};

/// The role of a turn's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Persona seeds, stage instructions, and passive observations
    System,
    /// The companion's owner
    User,
    /// The model
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        f.write_str(s)
    }
}

/// A single turn in a History.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who produced this turn
    pub role: Role,

    /// The text content
    pub content: String,

    /// Optional image reference (data URL or path) attached to the turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            image: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Attach an image reference to this turn.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}

/// An ordered, append-only sequence of turns.
///
/// If non-empty, the first turn is a system turn. The only way to shrink a
/// History is to replace it wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    turns: Vec<Turn>,
}

impl History {
    /// An empty History.
    pub fn new() -> Self {
        Self::default()
    }

    /// A History holding a single system turn.
    pub fn seeded(system_prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::system(system_prompt)],
        }
    }

    /// Rebuild a History from turns received over the wire.
    ///
    /// Returns `None` when the first turn is not a system turn.
    pub fn from_turns(turns: Vec<Turn>) -> Option<Self> {
        match turns.first() {
            Some(first) if first.role != Role::System => None,
            _ => Some(Self { turns }),
        }
    }

    /// Make sure the History starts with a system turn, seeding it with
    /// `system_prompt` when it is empty or starts with anything else.
    pub fn ensure_seed(&mut self, system_prompt: &str) {
        let seeded = self
            .turns
            .first()
            .is_some_and(|first| first.role == Role::System);
        if !seeded {
            self.turns.insert(0, Turn::system(system_prompt));
        }
    }

    /// Append a turn. Callers seed the History first (see [`History::ensure_seed`]).
    pub fn push(&mut self, turn: Turn) {
        debug_assert!(
            !self.turns.is_empty() || turn.role == Role::System,
            "History must start with a system turn"
        );
        self.turns.push(turn);
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn first(&self) -> Option<&Turn> {
        self.turns.first()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_history_starts_with_system() {
        let history = History::seeded("persona");
        assert_eq!(history.len(), 1);
        assert_eq!(history.first().unwrap().role, Role::System);
    }

    #[test]
    fn ensure_seed_only_inserts_once() {
        let mut history = History::new();
        history.ensure_seed("prompt");
        history.ensure_seed("prompt");
        assert_eq!(history.len(), 1);
        assert_eq!(history.first().unwrap().content, "prompt");
    }

    #[test]
    fn push_appends_in_order() {
        let mut history = History::seeded("persona");
        history.push(Turn::user("hi"));
        history.push(Turn::assistant("hello"));
        assert_eq!(history.len(), 3);
        assert_eq!(history.turns()[1].role, Role::User);
        assert_eq!(history.last().unwrap().content, "hello");
    }

    #[test]
    fn from_turns_rejects_non_system_head() {
        assert!(History::from_turns(vec![Turn::user("hi")]).is_none());
        assert!(History::from_turns(vec![]).is_some());
        assert!(History::from_turns(vec![Turn::system("s"), Turn::user("u")]).is_some());
    }

    #[test]
    fn history_serializes_as_plain_list() {
        let history = History::from_turns(vec![Turn::system("s"), Turn::assistant("a")]).unwrap();
        let json = serde_json::to_string(&history).unwrap();
        assert_eq!(
            json,
            r#"[{"role":"system","content":"s"},{"role":"assistant","content":"a"}]"#
        );
    }

    #[test]
    fn turn_with_image_keeps_reference() {
        let turn = Turn::user("look").with_image("data:image/png;base64,AAAA");
        let json = serde_json::to_string(&turn).unwrap();
        assert!(json.contains("image"));
        let back: Turn = serde_json::from_str(&json).unwrap();
        assert_eq!(back, turn);
    }
}
