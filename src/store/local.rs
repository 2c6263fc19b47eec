use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use super::{
    basename, read_catalog, write_catalog, StoreError, VideoStore, CATALOG_FILE, VIDEOS_DIR,
};
use crate::models::{VideoCatalog, VideoRecord};

/// Store rooted at a local directory: `<root>/videos.json` and
/// `<root>/videos/<file>`. Videos are served under `/videos/<file>`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.root.join(CATALOG_FILE)
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.root.join(VIDEOS_DIR)
    }
}

#[async_trait]
impl VideoStore for LocalStore {
    fn video_url(&self, file_name: &str) -> String {
        format!("/{VIDEOS_DIR}/{file_name}")
    }

    fn ensure_writable(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn load(&self) -> Result<VideoCatalog, StoreError> {
        read_catalog(&self.catalog_path()).await
    }

    async fn refresh(&self) -> Result<VideoCatalog, StoreError> {
        read_catalog(&self.catalog_path()).await
    }

    async fn publish(&self, record: &VideoRecord, video: &Path) -> Result<(), StoreError> {
        let videos_dir = self.videos_dir();
        tokio::fs::create_dir_all(&videos_dir)
            .await
            .map_err(|e| StoreError::io(format!("creating {}", videos_dir.display()), e))?;

        let file_name = basename(&record.video_url).unwrap_or(&record.video_url);
        let dest = videos_dir.join(file_name);
        tokio::fs::copy(video, &dest)
            .await
            .map_err(|e| StoreError::io(format!("copying video to {}", dest.display()), e))?;

        let mut catalog = read_catalog(&self.catalog_path()).await?;
        catalog.put(record.clone());
        write_catalog(&self.catalog_path(), &catalog).await?;

        info!(id = %record.id, path = %dest.display(), "published video locally");
        Ok(())
    }

    async fn has_video(&self, record: &VideoRecord) -> Result<bool, StoreError> {
        let Some(file_name) = basename(&record.video_url) else {
            return Ok(false);
        };
        let path = self.videos_dir().join(file_name);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StoreError::io(format!("checking {}", path.display()), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, title: &str) -> VideoRecord {
        VideoRecord {
            id: id.to_string(),
            celebrity_name: "Serena Williams".to_string(),
            title: title.to_string(),
            description: "Tennis legend".to_string(),
            custom_script: "...".to_string(),
            video_url: "/videos/serena-williams-history.mp4".to_string(),
        }
    }

    #[tokio::test]
    async fn publish_copies_video_and_updates_catalog() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalStore::new(root.path().join("data"));
        let rendered = root.path().join("rendered.mp4");
        std::fs::write(&rendered, b"first").unwrap();

        assert!(store.load().await.unwrap().videos.is_empty());
        assert!(!store.has_video(&record("1", "GOAT")).await.unwrap());

        store.publish(&record("1", "GOAT"), &rendered).await.unwrap();
        std::fs::write(&rendered, b"second").unwrap();
        store.publish(&record("1", "Still GOAT"), &rendered).await.unwrap();

        let catalog = store.refresh().await.unwrap();
        assert_eq!(catalog.videos.len(), 1);
        assert_eq!(catalog.videos[0].title, "Still GOAT");
        assert!(store.has_video(&catalog.videos[0]).await.unwrap());
        let bytes = std::fs::read(store.videos_dir().join("serena-williams-history.mp4")).unwrap();
        assert_eq!(bytes, b"second");
    }

    #[tokio::test]
    async fn unreadable_videos_dir_is_an_error_not_a_miss() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalStore::new(root.path().join("data"));
        std::fs::create_dir_all(root.path().join("data")).unwrap();
        std::fs::write(store.videos_dir(), b"not a directory").unwrap();

        let err = store.has_video(&record("1", "GOAT")).await.unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[test]
    fn urls_point_at_videos_route() {
        let store = LocalStore::new("/srv/data");
        assert_eq!(store.video_url("a-history.mp4"), "/videos/a-history.mp4");
    }
}
