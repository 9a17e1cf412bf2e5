//! # Murasame Core
//!
//! Domain types, collaborator traits, and error definitions for the Murasame
//! desktop companion. Nothing in here talks to the network or the filesystem;
//! the other crates implement these traits.
//!
//! ## Design Philosophy
//!
//! Every backend the companion needs (text generation, vision, speech,
//! screen capture) is a trait here. This enables:
//! - Swapping HTTP backends via configuration
//! - Scripted collaborators in tests
//! - A clean dependency graph (all crates depend inward on core)

pub mod backend;
pub mod error;
pub mod event;
pub mod message;
pub mod persona;

// Re-export key types at crate root for ergonomics
pub use backend::{
    Generation, GenerationRequest, ScreenSource, Screenshot, SpeechRequest, SpeechSynthesizer,
    TextGenerator, VisionDescriber, VisionRequest,
};
pub use error::{BackendError, Error, Result};
pub use event::{DomainEvent, EventBus};
pub use message::{History, Role, Turn};
pub use persona::{HEAD_PAT_TRIGGER, NO_THINK_MARKER, Persona, control_prompt, display_text, identity, strip_reasoning};
