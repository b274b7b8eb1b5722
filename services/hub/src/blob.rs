//! Blob storage for uploaded file bytes
//!
//! The catalog only ever stores an opaque key; the bytes live behind the
//! [`BlobStore`] trait.

use anyhow::Result;
use async_trait::async_trait;
use axum::body::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

/// Longest file-name fragment kept in a blob key
const MAX_NAME_LEN: usize = 100;

/// Storage backend for file bytes
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under a key, replacing any previous content
    async fn put(&self, key: &str, bytes: Bytes) -> Result<()>;

    /// Read the bytes stored under a key
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Remove a key; removing a missing key is not an error
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Blob store backed by a local directory
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Open (and create if needed) a blob directory
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        info!("Blob store rooted at {}", root.display());
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

        if !valid {
            anyhow::bail!("Invalid blob key: {:?}", key);
        }

        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, key: &str, bytes: Bytes) -> Result<()> {
        let path = self.path_for(key)?;
        let partial = self.root.join(format!(".{}.part", key));

        let written = match tokio::fs::write(&partial, &bytes).await {
            Ok(()) => tokio::fs::rename(&partial, &path).await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                if cleanup.kind() != ErrorKind::NotFound {
                    warn!("Failed to remove partial blob {}: {}", partial.display(), cleanup);
                }
            }
            return Err(e.into());
        }

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(Bytes::from(bytes))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// A fresh, collision-free key that still hints at the original file name
pub fn new_blob_key(filename: &str) -> String {
    format!("{}-{}", Uuid::new_v4(), sanitize_filename(filename))
}

/// Reduce a client-supplied file name to a safe `[A-Za-z0-9._-]` fragment
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_NAME_LEN)
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}
