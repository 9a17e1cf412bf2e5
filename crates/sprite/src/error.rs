use std::path::PathBuf;

/// Sprite loading and compositing errors.
#[derive(Debug, thiserror::Error)]
pub enum SpriteError {
    #[error("Failed to read {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("Failed to decode layer image {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Unknown art variant '{0}' (expected \"a\" or \"b\")")]
    UnknownVariant(String),

    #[error("Layer {0} is not in the layer table")]
    UnknownLayer(u32),

    #[error("Invalid layer selection: {0}")]
    InvalidSelection(String),

    #[error("Nothing to composite: {0}")]
    EmptyFrame(String),

    #[error("Failed to encode frame: {0}")]
    Encode(String),
}
