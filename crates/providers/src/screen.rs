//! Screen capture by running an external command that prints a PNG to stdout
//! (`grim -t png -`, `screencapture -x -t png /dev/stdout`, ...).

use async_trait::async_trait;
use murasame_core::{BackendError, ScreenSource, Screenshot};
use tokio::process::Command;
use tracing::{debug, warn};

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Captures the screen through a configured command.
#[derive(Debug, Clone)]
pub struct CommandScreenSource {
    program: String,
    args: Vec<String>,
}

impl CommandScreenSource {
    /// Build from an argv list; the first element is the program.
    pub fn from_argv(argv: &[String]) -> Result<Self, BackendError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| BackendError::NotConfigured("empty capture command".into()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

#[async_trait]
impl ScreenSource for CommandScreenSource {
    async fn capture(&self) -> Result<Screenshot, BackendError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| BackendError::Io(format!("{}: {e}", self.program)))?;

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(program = %self.program, exit_code = code, "Capture command failed");
            return Err(BackendError::Io(format!(
                "{} exited with {code}: {}",
                self.program,
                stderr.trim()
            )));
        }

        if !output.stdout.starts_with(PNG_SIGNATURE) {
            return Err(BackendError::malformed(
                "capture",
                "command output is not a PNG image",
            ));
        }

        debug!(bytes = output.stdout.len(), "Captured screen");
        Ok(Screenshot::png(output.stdout))
    }
}
