//! S1: the persona reply, with the anti-repeat policy.
//!
//! A reply that is empty, or longer than the exempt length and identical to
//! the previous turn, is thrown away and generated again. After the last
//! attempt whatever came back is accepted. Transient backend failures use
//! up an attempt; anything else aborts.

use murasame_core::{BackendError, GenerationRequest, TextGenerator, strip_reasoning};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,

    /// Replies of at most this many characters are never repeats
    pub exempt_len: usize,
}

impl Default for RepeatPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            exempt_len: 3,
        }
    }
}

impl RepeatPolicy {
    pub fn should_retry(&self, reply: &str, previous: Option<&str>) -> bool {
        if reply.is_empty() {
            return true;
        }
        reply.chars().count() > self.exempt_len && previous == Some(reply)
    }
}

/// Generate a reply. `Ok(None)` means the token was set between attempts.
pub(crate) async fn generate_reply(
    generator: &dyn TextGenerator,
    request: GenerationRequest,
    previous: Option<&str>,
    policy: RepeatPolicy,
    token: &CancellationToken,
) -> Result<Option<String>, BackendError> {
    let mut last_reply: Option<String> = None;
    let mut last_error: Option<BackendError> = None;

    for attempt in 1..=policy.max_attempts {
        if attempt > 1 && token.is_cancelled() {
            return Ok(None);
        }

        match generator.generate(request.clone()).await {
            Ok(generation) => {
                let reply = strip_reasoning(&generation.text).to_string();
                if !policy.should_retry(&reply, previous) {
                    return Ok(Some(reply));
                }
                debug!(attempt, generator = generator.name(), "Reply rejected as a repeat");
                last_reply = Some(reply);
            }
            Err(e) if e.is_transient() => {
                warn!(attempt, error = %e, "Transient generation failure");
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    match (last_reply, last_error) {
        (Some(reply), _) => {
            debug!(attempts = policy.max_attempts, "Accepting reply after exhausting retries");
            Ok(Some(reply))
        }
        (None, Some(e)) => Err(e),
        (None, None) => Err(BackendError::NotConfigured(
            "generation attempts must be at least 1".into(),
        )),
    }
}
