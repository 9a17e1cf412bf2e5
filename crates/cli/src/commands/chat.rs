//! `murasame chat`: Interactive or single-message chat.
//!
//! The terminal is the foreground surface: it never waits on a backend
//! inline. Each line is submitted to the coordinator and the reply arrives
//! through [`TerminalSink`] whenever the job commits.

use async_trait::async_trait;
use murasame_config::AppConfig;
use murasame_pipeline::{JobBundle, JobHandle, JobOutcome, ResultSink};
use murasame_sprite::Sprite;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::runtime;

/// Prints committed replies and redraws the portrait frame.
struct TerminalSink {
    name: String,
    sprite: Option<Arc<Sprite>>,
    frame_path: PathBuf,
    artifact_dir: PathBuf,
}

impl TerminalSink {
    /// Compositing and PNG encoding run on the blocking pool.
    async fn draw(&self, layers: Vec<u32>) {
        let Some(sprite) = self.sprite.clone() else {
            return;
        };
        let path = self.frame_path.clone();
        let drawn = tokio::task::spawn_blocking(move || {
            sprite
                .render(&layers)
                .and_then(|frame| frame.save_png(&path))
        })
        .await;
        match drawn {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Could not draw portrait"),
            Err(e) => warn!(error = %e, "Portrait renderer panicked"),
        }
    }
}

#[async_trait]
impl ResultSink for TerminalSink {
    async fn apply(&self, bundle: &JobBundle) {
        println!();
        for line in bundle.display_text.lines() {
            println!("  {} > {line}", self.name);
        }
        println!("  [{}] {}", bundle.emotion, bundle.translated);
        if let Some(key) = &bundle.audio {
            println!("  🔊 {}", self.artifact_dir.join(format!("{key}.wav")).display());
        }
        self.draw(bundle.layers.clone()).await;
        println!();
        prompt();
    }
}

fn prompt() {
    print!("  You > ");
    let _ = std::io::stdout().flush();
}

/// Report jobs that end without a reply.
fn watch(handle: JobHandle) {
    tokio::spawn(async move {
        match handle.wait().await {
            JobOutcome::Completed(_) => {}
            JobOutcome::Cancelled { .. } => eprintln!("\r  (interrupted)"),
            JobOutcome::Stale { .. } => eprintln!("\r  (discarded: the conversation moved on)"),
            JobOutcome::Failed(e) => {
                eprintln!("\r  [Error] {e}");
                prompt();
            }
        }
    });
}

pub async fn run(message: Option<String>, observe: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let persona = runtime::persona(&config);
    let sink = Arc::new(TerminalSink {
        name: persona.display_name.clone(),
        sprite: runtime::sprite(&config).map(Arc::new),
        frame_path: config.sprite.frame_path.clone(),
        artifact_dir: config.speech.artifact_dir.clone(),
    });
    sink.draw(config.sprite.initial_layers.clone()).await;

    let runtime = runtime::build(&config, sink.clone())?;
    let coordinator = runtime.coordinator;

    if let Some(msg) = message {
        // Single message mode
        eprint!("  Thinking...");
        let outcome = coordinator.submit_user(msg).await.wait().await;
        eprint!("\r              \r");
        return match outcome {
            JobOutcome::Completed(_) => Ok(()),
            JobOutcome::Failed(e) => Err(e.into()),
            other => Err(format!("No reply: {other:?}").into()),
        };
    }

    let shutdown = CancellationToken::new();
    let observer = match (observe || config.observation.enabled, runtime.observer) {
        (true, Some(observer)) => {
            coordinator.focus_lost();
            Some(observer.spawn(shutdown.clone()))
        }
        (true, None) => {
            eprintln!("  ⚠️  No capture command configured; not watching the screen");
            None
        }
        (false, _) => None,
    };

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║          Murasame — Interactive Mode          ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Chat:      {}", config.endpoints.chat_url);
    println!("  Speech:    {}", config.endpoints.speech_url);
    println!("  Watching:  {}", if coordinator.capture_enabled() { "yes" } else { "no" });
    if sink.sprite.is_some() {
        println!("  Portrait:  {}", config.sprite.frame_path.display());
    }
    println!();
    println!("  /reset  start over      /pat  pat her head");
    println!("  /watch on|off           exit  quit");
    println!();

    let (tx, mut rx) = mpsc::channel::<String>(32);
    tokio::spawn(async move {
        let mut lines = BufReader::new(io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            if matches!(line.as_str(), "exit" | "quit" | "/exit" | "/quit" | ":q") {
                break;
            }
            if tx.send(line).await.is_err() {
                break;
            }
        }
    });

    prompt();
    while let Some(line) = rx.recv().await {
        match line.as_str() {
            "/reset" => {
                coordinator.reset().await;
                sink.draw(config.sprite.initial_layers.clone()).await;
                println!("  🔄 Conversation reset");
                prompt();
            }
            "/pat" => watch(coordinator.submit_head_pat().await),
            "/watch on" => {
                coordinator.focus_lost();
                println!("  👀 Watching the screen");
                prompt();
            }
            "/watch off" => {
                coordinator.focus_gained();
                println!("  🙈 Not watching the screen");
                prompt();
            }
            text => watch(coordinator.submit_user(text).await),
        }
    }

    shutdown.cancel();
    if let Some(observer) = observer {
        let _ = observer.await;
    }
    println!("\n  👋 Bye!");
    Ok(())
}
