//! Murasame CLI: the main entry point.
//!
//! Commands:
//! - `onboard`: Write the default config
//! - `chat`: Talk to the companion (optionally while she watches the screen)
//! - `compose`: Render a layer list to a PNG
//! - `status`: Show configuration and local assets

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod runtime;

#[derive(Parser)]
#[command(
    name = "murasame",
    about = "Murasame — a desktop companion that talks, watches and changes expression",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration
    Onboard,

    /// Chat with the companion
    Chat {
        /// Send a single message and exit after the reply
        #[arg(short, long)]
        message: Option<String>,

        /// Watch the screen in the background and react to changes
        #[arg(long)]
        observe: bool,
    },

    /// Render portrait layers to a PNG
    Compose {
        /// Layer ids in drawing order, e.g. 1717,1475,1261
        #[arg(value_delimiter = ',', required = true)]
        layers: Vec<u32>,

        /// Art variant (a or b); defaults to the configured one
        #[arg(long)]
        variant: Option<String>,

        /// Output file
        #[arg(short, long, default_value = "frame.png")]
        output: PathBuf,

        /// Reject selections that are not base, expression, decorations, hair
        #[arg(long)]
        strict: bool,
    },

    /// Show configuration and asset status
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Chat { message, observe } => commands::chat::run(message, observe).await?,
        Commands::Compose {
            layers,
            variant,
            output,
            strict,
        } => commands::compose::run(layers, variant, output, strict).await?,
        Commands::Status => commands::status::run().await?,
    }

    Ok(())
}
