//! # Murasame Sprite
//!
//! The companion's portrait is a stack of PNG layers exported from a PSD:
//! one base body, one expression, optional decorations, and hair on top.
//! This crate loads the exported layer table, knows which ids each art
//! variant offers, and composites a layer list into one RGBA frame.

pub mod compositor;
pub mod error;
pub mod table;
pub mod variant;

pub use compositor::{CompositeFrame, FsAssets, LayerAssets, MemoryAssets, Sprite, composite};
pub use error::SpriteError;
pub use table::{LayerCategory, LayerSpec, LayerTable, Rect};
pub use variant::ArtVariant;
