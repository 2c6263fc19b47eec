//! The generation pipeline: validate, upsert, render, publish.
//!
//! Generations are serialised by one writer lock held from the catalog read
//! through publish and cleanup, so the read-modify-write of the metadata
//! document never interleaves and the work directory has one user at a time.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::models::{GenerateVideoRequest, ValidatedRequest, VideoRecord};
use crate::renderer::{RenderJob, Renderer};
use crate::store::VideoStore;

/// Outcome of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generated {
    /// Rendered and published before returning.
    Completed(VideoRecord),
    /// Accepted; rendering continues in a background task.
    Queued(VideoRecord),
}

impl Generated {
    pub fn record(&self) -> &VideoRecord {
        match self {
            Generated::Completed(record) | Generated::Queued(record) => record,
        }
    }
}

pub struct Generator {
    store: Arc<dyn VideoStore>,
    renderer: Arc<dyn Renderer>,
    work_dir: std::path::PathBuf,
    background: bool,
    write_lock: Arc<Mutex<()>>,
}

impl Generator {
    pub fn new(
        store: Arc<dyn VideoStore>,
        renderer: Arc<dyn Renderer>,
        work_dir: impl Into<std::path::PathBuf>,
        background: bool,
    ) -> Self {
        Self {
            store,
            renderer,
            work_dir: work_dir.into(),
            background,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Handles one submission from the generation endpoint.
    pub async fn submit(self: &Arc<Self>, request: &GenerateVideoRequest) -> ApiResult<Generated> {
        let valid = self.check(request)?;
        let guard = self.write_lock.clone().lock_owned().await;
        let (record, job) = self.prepare(&valid).await?;

        if !self.background {
            self.execute(&record, &job).await?;
            drop(guard);
            return Ok(Generated::Completed(record));
        }

        let this = Arc::clone(self);
        let queued = record.clone();
        tokio::spawn(async move {
            let _guard: OwnedMutexGuard<()> = guard;
            if let Err(e) = this.execute(&record, &job).await {
                error!(id = %record.id, "background generation failed: {}", e);
            }
        });
        Ok(Generated::Queued(queued))
    }

    /// Renders and publishes synchronously, regardless of the background
    /// setting.
    pub async fn generate_now(&self, request: &GenerateVideoRequest) -> ApiResult<VideoRecord> {
        let valid = self.check(request)?;
        let _guard = self.write_lock.lock().await;
        let (record, job) = self.prepare(&valid).await?;
        self.execute(&record, &job).await?;
        Ok(record)
    }

    /// Waits until no generation holds the writer lock.
    pub async fn idle(&self) {
        let _guard = self.write_lock.lock().await;
    }

    fn check(&self, request: &GenerateVideoRequest) -> ApiResult<ValidatedRequest> {
        let valid = request.validate().map_err(ApiError::BadRequest)?;
        self.store
            .ensure_writable()
            .map_err(|e| ApiError::MissingCredential(e.to_string()))?;
        Ok(valid)
    }

    async fn prepare(&self, valid: &ValidatedRequest) -> ApiResult<(VideoRecord, RenderJob)> {
        clean_dir(&self.work_dir).await.map_err(|e| {
            ApiError::internal(format!("Failed to prepare {}: {e}", self.work_dir.display()))
        })?;

        let mut catalog = self.store.refresh().await?;
        let video_url = self.store.video_url(&valid.file_name);
        let existing = catalog.find_by_url(&video_url).is_some();
        let record = catalog.upsert(valid, &video_url, Utc::now().timestamp_millis().max(0) as u64);

        if existing {
            info!(id = %record.id, url = %video_url, "re-generating existing video");
        } else {
            info!(id = %record.id, url = %video_url, "generating new video");
        }

        let job = RenderJob {
            celebrity_name: valid.celebrity_name.clone(),
            title: valid.title.clone(),
            description: valid.description.clone(),
            custom_script: valid.custom_script.clone(),
            work_dir: self.work_dir.clone(),
            file_name: valid.file_name.clone(),
        };
        tokio::fs::create_dir_all(job.output_dir()).await.map_err(|e| {
            ApiError::internal(format!("Failed to prepare {}: {e}", job.output_dir().display()))
        })?;
        Ok((record, job))
    }

    async fn execute(&self, record: &VideoRecord, job: &RenderJob) -> ApiResult<()> {
        let result = self.render_and_publish(record, job).await;
        if let Err(e) = clean_dir(&self.work_dir).await {
            warn!("Failed to clean up {}: {}", self.work_dir.display(), e);
        }
        result
    }

    async fn render_and_publish(&self, record: &VideoRecord, job: &RenderJob) -> ApiResult<()> {
        let output = self.renderer.render(job).await?;
        self.store.publish(record, &output.video_path).await?;
        info!(id = %record.id, url = %record.video_url, "video generation completed");
        Ok(())
    }
}

/// Empties `dir`, creating it when absent.
async fn clean_dir(dir: &Path) -> std::io::Result<()> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tokio::fs::create_dir_all(dir).await?;
            info!("Created {}", dir.display());
            return Ok(());
        }
        Err(e) => return Err(e),
    };
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(&path).await?;
        } else {
            tokio::fs::remove_file(&path).await?;
        }
        info!("Deleted temporary file: {}", path.display());
    }
    Ok(())
}
