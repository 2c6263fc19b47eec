//! Persistence of the metadata document and the video binaries.

mod git;
mod local;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{AppConfig, StorageBackend};
use crate::models::{VideoCatalog, VideoRecord};

pub use git::GitRepoStore;
pub use local::LocalStore;

/// File name of the metadata document inside a store.
pub const CATALOG_FILE: &str = "videos.json";
/// Directory holding the binaries inside a store.
pub const VIDEOS_DIR: &str = "videos";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid videos.json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("fetching videos.json returned HTTP {0}")]
    Status(u16),

    #[error("git {command} failed: {message}")]
    Git { command: String, message: String },

    #[error("GITHUB_TOKEN not set")]
    MissingCredential,
}

impl StoreError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

#[async_trait]
pub trait VideoStore: Send + Sync {
    /// Public URL of a published video.
    fn video_url(&self, file_name: &str) -> String;

    /// Fails when the store cannot accept writes, e.g. a missing credential.
    fn ensure_writable(&self) -> Result<(), StoreError>;

    /// Cheap read for listings. A missing document is an empty catalog.
    async fn load(&self) -> Result<VideoCatalog, StoreError>;

    /// Authoritative read, bypassing any cache between us and the store.
    async fn refresh(&self) -> Result<VideoCatalog, StoreError>;

    /// Stores `video` under the record's file name and writes the record into
    /// the document, replacing any record with the same `video_url`.
    async fn publish(&self, record: &VideoRecord, video: &Path) -> Result<(), StoreError>;

    /// Whether the record's video is reachable.
    async fn has_video(&self, record: &VideoRecord) -> Result<bool, StoreError>;
}

/// Builds the backend selected by `config.backend`.
pub fn from_config(config: &AppConfig, http: reqwest::Client) -> Arc<dyn VideoStore> {
    match config.backend {
        StorageBackend::Local => Arc::new(LocalStore::new(&config.data_dir)),
        StorageBackend::GitHub => Arc::new(GitRepoStore::new(
            config.github.clone(),
            config.github_token.clone(),
            http,
        )),
    }
}

/// Final component of a URL or path, splitting on both separators.
pub fn basename(path: &str) -> Option<&str> {
    let name = path
        .trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()?
        .split(['?', '#'])
        .next()?;
    match name {
        "" | "." | ".." => None,
        name => Some(name),
    }
}

pub(crate) async fn read_catalog(path: &Path) -> Result<VideoCatalog, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(VideoCatalog::default()),
        Err(e) => Err(StoreError::io(format!("reading {}", path.display()), e)),
    }
}

/// Writes the document next to `path` and renames it into place.
pub(crate) async fn write_catalog(path: &Path, catalog: &VideoCatalog) -> Result<(), StoreError> {
    let json = serde_json::to_vec_pretty(catalog)?;
    let tmp: PathBuf = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json)
        .await
        .map_err(|e| StoreError::io(format!("writing {}", tmp.display()), e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| StoreError::io(format!("replacing {}", path.display()), e))
}
