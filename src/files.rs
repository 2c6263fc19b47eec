//! Serves rendered videos from the single serving directory.

use std::path::Path as FsPath;

use axum::body::StreamBody;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::{debug, error};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::store::basename;

#[derive(Debug, Deserialize)]
pub struct VideoPathQuery {
    pub path: Option<String>,
}

/// `GET /api/video?path=`
pub async fn video_by_query(
    State(state): State<AppState>,
    Query(query): Query<VideoPathQuery>,
) -> ApiResult<Response> {
    let requested = query
        .path
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing path parameter"))?;
    stream_video(&state.config.serve_dir, &requested).await
}

/// `GET /videos/:file`
pub async fn video_by_name(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> ApiResult<Response> {
    stream_video(&state.config.serve_dir, &file).await
}

/// Streams `<dir>/<basename of requested>`. Anything before the final path
/// component is ignored.
pub async fn stream_video(dir: &FsPath, requested: &str) -> ApiResult<Response> {
    let name = basename(requested).ok_or_else(|| ApiError::not_found("Video not found"))?;
    let path = dir.join(name);

    let metadata = match tokio::fs::metadata(&path).await {
        Ok(m) if m.is_file() => m,
        _ => {
            debug!(path = %path.display(), "video not found");
            return Err(ApiError::not_found("Video not found"));
        }
    };
    let file = tokio::fs::File::open(&path).await.map_err(|e| {
        error!(path = %path.display(), "Error serving video: {}", e);
        ApiError::internal("Failed to serve video")
    })?;

    let headers = [
        (header::CONTENT_TYPE, "video/mp4".to_string()),
        (header::CONTENT_LENGTH, metadata.len().to_string()),
    ];
    Ok((headers, StreamBody::new(ReaderStream::new(file))).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn serves_by_basename_only() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("videos");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("a-history.mp4"), b"0123456789").unwrap();
        std::fs::write(root.path().join("secret.mp4"), b"nope").unwrap();

        let response = stream_video(&dir, "/anything/at/all/a-history.mp4").await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "10");

        let err = stream_video(&dir, "../secret.mp4").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        let err = stream_video(&dir, "..").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn directories_are_not_served() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("nested")).unwrap();
        let err = stream_video(root.path(), "nested").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
