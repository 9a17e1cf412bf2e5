//! S4 and S6: speech synthesis in the background, then waiting for it.
//!
//! S4 spawns a task that synthesizes the translated line and stores it
//! under the line's content hash, skipping synthesis when the artifact is
//! already there. S6 awaits that task with a deadline, then polls the
//! store until the artifact is visible. A failed or late synthesis leaves
//! the job without audio; it never fails the job.

use murasame_core::{SpeechRequest, SpeechSynthesizer};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::artifact::{ArtifactKey, ArtifactStore};

/// Start synthesis. The task resolves to the key once the artifact is stored.
pub(crate) fn spawn_synthesis(
    speech: Arc<dyn SpeechSynthesizer>,
    store: Arc<dyn ArtifactStore>,
    text: String,
    emotion: String,
) -> JoinHandle<Option<ArtifactKey>> {
    tokio::spawn(async move {
        let key = ArtifactKey::for_text(&text);
        if store.contains(&key).await {
            debug!(key = %key, "Speech already cached");
            return Some(key);
        }

        let audio = match speech.synthesize(SpeechRequest { text, emotion }).await {
            Ok(audio) => audio,
            Err(e) => {
                warn!(key = %key, error = %e, "Speech synthesis failed");
                return None;
            }
        };
        match store.put(&key, audio).await {
            Ok(()) => Some(key),
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to store speech");
                None
            }
        }
    })
}

/// How S6 ended.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ArtifactWait {
    Ready(ArtifactKey),
    Unavailable,
    Cancelled,
}

pub(crate) async fn await_artifact(
    handle: JoinHandle<Option<ArtifactKey>>,
    store: &dyn ArtifactStore,
    timeout: Duration,
    poll: Duration,
    token: &CancellationToken,
) -> ArtifactWait {
    let wait = async {
        let key = match handle.await {
            Ok(Some(key)) => key,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Speech task did not finish");
                return None;
            }
        };
        let mut interval = tokio::time::interval(poll);
        loop {
            interval.tick().await;
            if store.contains(&key).await {
                return Some(key);
            }
        }
    };

    tokio::select! {
        biased;
        _ = token.cancelled() => ArtifactWait::Cancelled,
        result = tokio::time::timeout(timeout, wait) => match result {
            Ok(Some(key)) => ArtifactWait::Ready(key),
            Ok(None) => ArtifactWait::Unavailable,
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "Gave up waiting for speech");
                ArtifactWait::Unavailable
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::MemoryArtifactStore;
    use crate::test_helpers::RecordingSynthesizer;
    use murasame_core::BackendError;

    const TIMEOUT: Duration = Duration::from_secs(60);
    const POLL: Duration = Duration::from_millis(100);

    #[tokio::test]
    async fn synthesizes_and_stores() {
        let speech = Arc::new(RecordingSynthesizer::new());
        let store = Arc::new(MemoryArtifactStore::new());
        let handle = spawn_synthesis(speech.clone(), store.clone(), "吾輩じゃ".into(), "平静".into());

        let wait = await_artifact(handle, store.as_ref(), TIMEOUT, POLL, &CancellationToken::new()).await;
        assert_eq!(wait, ArtifactWait::Ready(ArtifactKey::for_text("吾輩じゃ")));
        assert_eq!(speech.requests().len(), 1);
        assert_eq!(speech.requests()[0].emotion, "平静");
    }

    #[tokio::test]
    async fn cached_artifact_skips_synthesis() {
        let speech = Arc::new(RecordingSynthesizer::new());
        let store = Arc::new(MemoryArtifactStore::new());
        store
            .put(&ArtifactKey::for_text("吾輩じゃ"), vec![0])
            .await
            .unwrap();

        let handle = spawn_synthesis(speech.clone(), store.clone(), "吾輩じゃ".into(), "平静".into());
        assert!(handle.await.unwrap().is_some());
        assert!(speech.requests().is_empty());
    }

    #[tokio::test]
    async fn synthesis_failure_means_no_audio() {
        let speech = Arc::new(RecordingSynthesizer::failing(BackendError::Network("down".into())));
        let store = Arc::new(MemoryArtifactStore::new());
        let handle = spawn_synthesis(speech, store.clone(), "x".into(), "平静".into());

        let wait = await_artifact(handle, store.as_ref(), TIMEOUT, POLL, &CancellationToken::new()).await;
        assert_eq!(wait, ArtifactWait::Unavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_synthesis_times_out() {
        let speech = Arc::new(RecordingSynthesizer::new().with_delay(Duration::from_secs(600)));
        let store = Arc::new(MemoryArtifactStore::new());
        let handle = spawn_synthesis(speech, store.clone(), "x".into(), "平静".into());

        let wait = await_artifact(handle, store.as_ref(), TIMEOUT, POLL, &CancellationToken::new()).await;
        assert_eq!(wait, ArtifactWait::Unavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_wins_over_wait() {
        let speech = Arc::new(RecordingSynthesizer::new().with_delay(Duration::from_secs(30)));
        let store = Arc::new(MemoryArtifactStore::new());
        let handle = spawn_synthesis(speech, store.clone(), "x".into(), "平静".into());
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let wait = await_artifact(handle, store.as_ref(), TIMEOUT, POLL, &token).await;
        assert_eq!(wait, ArtifactWait::Cancelled);
    }
}
