//! The layer table exported alongside the layer PNGs.
//!
//! Photoshop writes one tab-delimited row per layer, UTF-16LE by default.
//! Columns 2..=5 hold the layer rectangle (x, y, width, height) in PSD
//! coordinates and column 9 the layer id. Header and group rows do not
//! parse and are skipped, but they still count toward row numbering: the
//! base bodies are identified by their raw row index.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::SpriteError;
use crate::variant::ArtVariant;

/// What a layer depicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerCategory {
    Base,
    Expression,
    Decoration,
    Hair,
}

/// A layer rectangle in PSD coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// One compositable layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSpec {
    pub id: u32,
    pub category: LayerCategory,
    pub rect: Rect,
    pub asset: PathBuf,
}

/// All layers of one art variant. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct LayerTable {
    variant: ArtVariant,
    layers: HashMap<u32, LayerSpec>,
    base_rects: Vec<Rect>,
}

impl LayerTable {
    /// Load `<asset_dir>/<variant name>.txt`.
    pub fn load(asset_dir: &Path, variant: ArtVariant) -> Result<Self, SpriteError> {
        let path = asset_dir.join(format!("{}.txt", variant.asset_name()));
        let bytes = std::fs::read(&path).map_err(|e| SpriteError::Io {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let table = Self::parse(&decode_text(&bytes), variant, asset_dir);
        debug!(path = %path.display(), layers = table.len(), "Loaded layer table");
        Ok(table)
    }

    /// Parse table text. Asset paths are resolved against `asset_dir`.
    pub fn parse(text: &str, variant: ArtVariant, asset_dir: &Path) -> Self {
        let base_rows = variant.base_rows();
        let mut layers = HashMap::new();
        let mut base_rects = Vec::new();

        for (row, line) in text.lines().enumerate() {
            let Some((id, rect)) = parse_row(line) else {
                continue;
            };

            let category = if base_rows.contains(&row) {
                base_rects.push(rect);
                Some(LayerCategory::Base)
            } else {
                variant.category_of(id)
            };
            let Some(category) = category else {
                continue;
            };

            let asset = asset_dir.join(format!("{}_{id}.png", variant.asset_name()));
            layers.insert(
                id,
                LayerSpec {
                    id,
                    category,
                    rect,
                    asset,
                },
            );
        }

        Self {
            variant,
            layers,
            base_rects,
        }
    }

    pub fn variant(&self) -> ArtVariant {
        self.variant
    }

    pub fn get(&self, id: u32) -> Option<&LayerSpec> {
        self.layers.get(&id)
    }

    /// Rectangles of every base-body row, selected or not.
    pub fn base_rects(&self) -> &[Rect] {
        &self.base_rects
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

fn parse_row(line: &str) -> Option<(u32, Rect)> {
    let cols: Vec<&str> = line.trim_end_matches('\r').split('\t').collect();
    if cols.len() < 10 {
        return None;
    }
    let rect = Rect {
        x: cols[2].trim().parse().ok()?,
        y: cols[3].trim().parse().ok()?,
        width: cols[4].trim().parse().ok()?,
        height: cols[5].trim().parse().ok()?,
    };
    let id = cols[9].trim().parse().ok()?;
    Some((id, rect))
}

/// Decode UTF-16LE (with or without BOM) or UTF-8 (with or without BOM).
fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return decode_utf16le(rest);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    // ASCII-heavy UTF-16LE has a NUL in most high bytes.
    let looks_utf16 = bytes.len() >= 2
        && bytes.len() % 2 == 0
        && bytes.iter().skip(1).step_by(2).filter(|b| **b == 0).count() * 2 > bytes.len() / 2;
    if looks_utf16 {
        decode_utf16le(bytes)
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

fn decode_utf16le(bytes: &[u8]) -> String {
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}
