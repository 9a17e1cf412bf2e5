//! `murasame compose`: Render a layer list to a PNG.

use murasame_config::AppConfig;
use murasame_sprite::{ArtVariant, Sprite};
use std::path::PathBuf;

pub async fn run(
    layers: Vec<u32>,
    variant: Option<String>,
    output: PathBuf,
    strict: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let variant: ArtVariant = variant.as_deref().unwrap_or(&config.sprite.variant).parse()?;

    if strict {
        variant.validate_selection(&layers)?;
    }

    let sprite = Sprite::load(&config.sprite.asset_dir, variant)?;
    let frame = sprite.render(&layers)?;
    frame.save_png(&output)?;

    println!(
        "✅ Rendered {} layer(s) of variant {variant} → {} ({}x{})",
        layers.len(),
        output.display(),
        frame.width(),
        frame.height()
    );
    Ok(())
}
