//! `murasame status`: Show configuration and local assets.

use murasame_config::AppConfig;
use murasame_providers::ReferenceVoices;
use murasame_sprite::{ArtVariant, LayerTable};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("🗡️  Murasame Status");
    println!("==================");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Chat:         {}", config.endpoints.chat_url);
    println!("  Assistant:    {}", config.endpoints.assistant_url);
    println!("  Vision:       {} ({})", config.endpoints.vision_url, config.endpoints.vision_model);
    println!("  Speech:       {}", config.endpoints.speech_url);
    println!("  API key:      {}", if config.endpoints.api_key.is_some() { "set" } else { "not set" });
    println!(
        "  Observation:  {} every {}s",
        if config.observation.enabled { "enabled" } else { "disabled" },
        config.observation.interval_secs
    );
    println!();

    match ReferenceVoices::scan(&config.speech.reference_dir) {
        Ok(voices) if !voices.labels().is_empty() => {
            println!("  ✅ Emotions:  {}", voices.labels().join("、"));
        }
        Ok(_) => println!(
            "  ⚠️  No reference voices in {}",
            config.speech.reference_dir.display()
        ),
        Err(e) => println!("  ❌ Reference voices: {e}"),
    }

    match config.sprite.variant.parse::<ArtVariant>() {
        Ok(variant) => match LayerTable::load(&config.sprite.asset_dir, variant) {
            Ok(table) => println!("  ✅ Portrait:  variant {variant}, {} layers", table.len()),
            Err(e) => println!("  ❌ Portrait:  {e}"),
        },
        Err(e) => println!("  ❌ Portrait:  {e}"),
    }

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `murasame onboard` first");
    }

    Ok(())
}
