//! Content-addressed speech artifacts.
//!
//! Audio is keyed by the SHA-256 of the text it speaks, so synthesizing the
//! same line twice lands on the same key. Stores are append-only.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

/// Hex SHA-256 of the synthesized text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey(String);

impl ArtifactKey {
    pub fn for_text(text: &str) -> Self {
        Self(hex::encode(Sha256::digest(text.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Artifact I/O failed at {path}: {reason}")]
    Io { path: PathBuf, reason: String },
}

/// Where synthesized audio goes.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn contains(&self, key: &ArtifactKey) -> bool;

    /// Store `bytes` under `key`. Storing an existing key is a no-op.
    async fn put(&self, key: &ArtifactKey, bytes: Vec<u8>) -> Result<(), ArtifactError>;

    async fn get(&self, key: &ArtifactKey) -> Result<Option<Vec<u8>>, ArtifactError>;

    /// A filesystem path for the artifact, if the store has one.
    fn locate(&self, _key: &ArtifactKey) -> Option<PathBuf> {
        None
    }
}

/// Stores artifacts as `<dir>/<key>.wav`.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    dir: PathBuf,
}

impl FsArtifactStore {
    /// Open (and create if needed) the artifact directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ArtifactError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| ArtifactError::Io {
            path: dir.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &ArtifactKey) -> PathBuf {
        self.dir.join(format!("{key}.wav"))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn contains(&self, key: &ArtifactKey) -> bool {
        tokio::fs::metadata(self.path(key))
            .await
            .is_ok_and(|meta| meta.is_file())
    }

    async fn put(&self, key: &ArtifactKey, bytes: Vec<u8>) -> Result<(), ArtifactError> {
        let path = self.path(key);
        if self.contains(key).await {
            debug!(key = %key, "Artifact already stored");
            return Ok(());
        }

        // Write aside and rename so readers never see a partial file.
        let tmp = self
            .dir
            .join(format!("{key}.{}.tmp", uuid::Uuid::new_v4().simple()));
        if let Err(e) = tokio::fs::write(&tmp, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(ArtifactError::Io {
                path: tmp,
                reason: e.to_string(),
            });
        }
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(ArtifactError::Io {
                path,
                reason: e.to_string(),
            });
        }

        debug!(key = %key, bytes = bytes.len(), "Stored artifact");
        Ok(())
    }

    async fn get(&self, key: &ArtifactKey) -> Result<Option<Vec<u8>>, ArtifactError> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ArtifactError::Io {
                path,
                reason: e.to_string(),
            }),
        }
    }

    fn locate(&self, key: &ArtifactKey) -> Option<PathBuf> {
        Some(self.path(key))
    }
}

/// In-memory artifact store.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    entries: RwLock<HashMap<ArtifactKey, Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn contains(&self, key: &ArtifactKey) -> bool {
        self.entries.read().await.contains_key(key)
    }

    async fn put(&self, key: &ArtifactKey, bytes: Vec<u8>) -> Result<(), ArtifactError> {
        self.entries
            .write()
            .await
            .entry(key.clone())
            .or_insert(bytes);
        Ok(())
    }

    async fn get(&self, key: &ArtifactKey) -> Result<Option<Vec<u8>>, ArtifactError> {
        Ok(self.entries.read().await.get(key).cloned())
    }
}
