//! Layer compositing.
//!
//! Layers are anchored on the selected base body: every rectangle is
//! shifted by the smallest base-layer offset so the body starts at the
//! origin. The canvas spans the furthest right and bottom edge of the
//! selection. Color channels blend alpha-over, the alpha channel keeps the
//! maximum of source and destination so overlapping opaque layers leave no
//! translucent seams. Pixels shifted to negative coordinates are clipped.

use image::{ImageFormat, Rgba, RgbaImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::SpriteError;
use crate::table::{LayerCategory, LayerSpec, LayerTable};
use crate::variant::ArtVariant;

/// Source of layer pixels.
pub trait LayerAssets: Send + Sync {
    fn load(&self, layer: &LayerSpec) -> Result<RgbaImage, SpriteError>;
}

/// Reads each layer from its PNG on disk.
#[derive(Debug, Clone, Default)]
pub struct FsAssets;

impl LayerAssets for FsAssets {
    fn load(&self, layer: &LayerSpec) -> Result<RgbaImage, SpriteError> {
        let image = image::open(&layer.asset).map_err(|e| match e {
            image::ImageError::IoError(io) => SpriteError::Io {
                path: layer.asset.clone(),
                reason: io.to_string(),
            },
            other => SpriteError::Decode {
                path: layer.asset.clone(),
                reason: other.to_string(),
            },
        })?;
        Ok(image.to_rgba8())
    }
}

/// Layer pixels held in memory, keyed by layer id.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssets {
    images: HashMap<u32, RgbaImage>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: u32, image: RgbaImage) {
        self.images.insert(id, image);
    }
}

impl LayerAssets for MemoryAssets {
    fn load(&self, layer: &LayerSpec) -> Result<RgbaImage, SpriteError> {
        self.images.get(&layer.id).cloned().ok_or_else(|| SpriteError::Io {
            path: layer.asset.clone(),
            reason: "not loaded".into(),
        })
    }
}

/// A rendered portrait. Owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeFrame {
    image: RgbaImage,
}

impl CompositeFrame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.image.get_pixel(x, y).0
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Encode as PNG.
    pub fn to_png(&self) -> Result<Vec<u8>, SpriteError> {
        let mut bytes = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| SpriteError::Encode(e.to_string()))?;
        Ok(bytes)
    }

    pub fn save_png(&self, path: &Path) -> Result<(), SpriteError> {
        self.image
            .save_with_format(path, ImageFormat::Png)
            .map_err(|e| SpriteError::Encode(format!("{}: {e}", path.display())))
    }
}

/// Composite `ids` in order. Ids missing from the table and layers whose
/// pixels cannot be loaded are skipped with a warning.
pub fn composite(
    table: &LayerTable,
    assets: &dyn LayerAssets,
    ids: &[u32],
) -> Result<CompositeFrame, SpriteError> {
    if ids.is_empty() {
        return Err(SpriteError::EmptyFrame("no layers selected".into()));
    }

    let layers: Vec<&LayerSpec> = ids
        .iter()
        .filter_map(|&id| {
            let layer = table.get(id);
            if layer.is_none() {
                warn!(layer_id = id, variant = %table.variant(), "Layer not in table, skipping");
            }
            layer
        })
        .collect();

    let selected_bases: Vec<_> = layers
        .iter()
        .filter(|layer| layer.category == LayerCategory::Base)
        .map(|layer| layer.rect)
        .collect();
    let anchor_rects = if !selected_bases.is_empty() {
        selected_bases
    } else if !table.base_rects().is_empty() {
        table.base_rects().to_vec()
    } else {
        layers.iter().map(|layer| layer.rect).collect()
    };

    let (Some(anchor_x), Some(anchor_y)) = (
        anchor_rects.iter().map(|r| r.x).min(),
        anchor_rects.iter().map(|r| r.y).min(),
    ) else {
        return Err(SpriteError::EmptyFrame(
            "none of the selected layers are in the table".into(),
        ));
    };

    let placed: Vec<(&LayerSpec, i64, i64)> = layers
        .into_iter()
        .map(|layer| {
            (
                layer,
                i64::from(layer.rect.x) - i64::from(anchor_x),
                i64::from(layer.rect.y) - i64::from(anchor_y),
            )
        })
        .collect();

    let width = placed
        .iter()
        .map(|(layer, x, _)| x + i64::from(layer.rect.width))
        .max()
        .unwrap_or(0);
    let height = placed
        .iter()
        .map(|(layer, _, y)| y + i64::from(layer.rect.height))
        .max()
        .unwrap_or(0);
    let (Ok(width), Ok(height)) = (u32::try_from(width), u32::try_from(height)) else {
        return Err(SpriteError::EmptyFrame("selection lies left of or above the base".into()));
    };
    if width == 0 || height == 0 {
        return Err(SpriteError::EmptyFrame("zero-sized canvas".into()));
    }

    let mut canvas = RgbaImage::new(width, height);
    for (layer, x, y) in placed {
        match assets.load(layer) {
            Ok(pixels) => blend(&mut canvas, &pixels, x, y),
            Err(e) => warn!(layer_id = layer.id, error = %e, "Layer asset unavailable, skipping"),
        }
    }

    debug!(width, height, layers = ids.len(), "Composited frame");
    Ok(CompositeFrame { image: canvas })
}

fn blend(canvas: &mut RgbaImage, layer: &RgbaImage, offset_x: i64, offset_y: i64) {
    let (width, height) = (i64::from(canvas.width()), i64::from(canvas.height()));

    for (sx, sy, src) in layer.enumerate_pixels() {
        let dx = offset_x + i64::from(sx);
        let dy = offset_y + i64::from(sy);
        if dx < 0 || dy < 0 || dx >= width || dy >= height {
            continue;
        }
        // Bounds checked above.
        let dst = canvas.get_pixel_mut(dx as u32, dy as u32);
        let alpha = f64::from(src[3]) / 255.0;
        let mut out = [0u8; 4];
        for c in 0..3 {
            out[c] = (alpha * f64::from(src[c]) + (1.0 - alpha) * f64::from(dst[c])) as u8;
        }
        out[3] = src[3].max(dst[3]);
        *dst = Rgba(out);
    }
}

/// A loaded art variant: its table plus a pixel source.
pub struct Sprite {
    table: LayerTable,
    assets: Box<dyn LayerAssets>,
}

impl Sprite {
    pub fn new(table: LayerTable, assets: Box<dyn LayerAssets>) -> Self {
        Self { table, assets }
    }

    /// Load the table from `asset_dir` and read layers from disk.
    pub fn load(asset_dir: impl Into<PathBuf>, variant: ArtVariant) -> Result<Self, SpriteError> {
        let asset_dir: PathBuf = asset_dir.into();
        let table = LayerTable::load(&asset_dir, variant)?;
        Ok(Self::new(table, Box::new(FsAssets)))
    }

    pub fn variant(&self) -> ArtVariant {
        self.table.variant()
    }

    pub fn table(&self) -> &LayerTable {
        &self.table
    }

    pub fn render(&self, ids: &[u32]) -> Result<CompositeFrame, SpriteError> {
        composite(&self.table, self.assets.as_ref(), ids)
    }
}
