//! Backend implementations for Murasame.
//!
//! Every backend implements one of the collaborator traits from
//! `murasame_core::backend`. [`build_from_config`] wires them up from
//! the application configuration.

pub mod chat_endpoint;
mod http;
pub mod registry;
pub mod screen;
pub mod sovits;
pub mod vision;

pub use chat_endpoint::ChatEndpoint;
pub use registry::{Backends, build_from_config};
pub use screen::CommandScreenSource;
pub use sovits::{ReferenceVoice, ReferenceVoices, SovitsSynthesizer};
pub use vision::OpenAiVision;
