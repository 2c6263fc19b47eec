//! Upstream fetch proxies with bounded retries.

use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::retry::{retry, AttemptError, RetryPolicy};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UrlQuery {
    pub url: Option<String>,
}

fn no_cache(request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    request
        .header(reqwest::header::CACHE_CONTROL, "no-cache, no-store, must-revalidate")
        .header(reqwest::header::PRAGMA, "no-cache")
        .header(reqwest::header::EXPIRES, "0")
}

fn permissive_headers(content_type: HeaderValue) -> [(header::HeaderName, HeaderValue); 3] {
    [
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
        (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        (header::CONTENT_TYPE, content_type),
    ]
}

/// `GET /api/proxy-json?url=`
pub async fn proxy_json(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> ApiResult<Response> {
    let url = query
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("URL parameter is required"))?;

    let proxy = &state.config.proxy;
    let policy = RetryPolicy::fixed("ProxyJSON", proxy.max_attempts, proxy.json_delay);
    let value = retry(&policy, |_| fetch_json(&state.http, &url))
        .await
        .map_err(|e| ApiError::Upstream {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("Failed to proxy JSON: {e}"),
        })?;

    info!(%url, "[ProxyJSON] Successfully fetched JSON");
    Ok((
        StatusCode::OK,
        permissive_headers(HeaderValue::from_static("application/json")),
        Json(value),
    )
        .into_response())
}

async fn fetch_json(
    http: &reqwest::Client,
    url: &str,
) -> Result<serde_json::Value, AttemptError<String>> {
    let response = no_cache(http.get(url))
        .send()
        .await
        .map_err(|e| AttemptError::Retry(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(AttemptError::Retry(format!("Failed to fetch JSON: {}", status.as_u16())));
    }
    response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| AttemptError::Retry(e.to_string()))
}

/// Why a video fetch attempt failed.
#[derive(Debug, Error)]
pub enum VideoFetchError {
    #[error("Invalid GitHub token")]
    Unauthorized,

    #[error("Video access denied: Check GitHub repo permissions")]
    Forbidden,

    #[error("Video not found, try again later")]
    NotFound,

    #[error("GitHub rate limit exceeded, try again later")]
    RateLimited,

    #[error("Failed to fetch video: {0}")]
    Status(u16),

    #[error("Failed to proxy video: {0}")]
    Transport(String),
}

impl VideoFetchError {
    fn from_status(status: u16) -> AttemptError<Self> {
        match status {
            401 => AttemptError::Abort(Self::Unauthorized),
            403 => AttemptError::Abort(Self::Forbidden),
            404 => AttemptError::Retry(Self::NotFound),
            429 => AttemptError::Retry(Self::RateLimited),
            other => AttemptError::Retry(Self::Status(other)),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized | Self::Forbidden | Self::Transport(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Status(code) => StatusCode::from_u16(*code).unwrap_or(StatusCode::BAD_GATEWAY),
        }
    }
}

impl From<VideoFetchError> for ApiError {
    fn from(e: VideoFetchError) -> Self {
        ApiError::Upstream {
            status: e.status_code(),
            message: e.to_string(),
        }
    }
}

struct FetchedVideo {
    content_type: Option<String>,
    body: Bytes,
}

/// `GET /api/proxy-video?url=`
///
/// The repository token is attached, so only URLs under the configured raw
/// base are fetched.
pub async fn proxy_video(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> ApiResult<Response> {
    let url = query
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Video URL is required"))?;
    let token = state.config.github_token.as_deref().ok_or_else(|| {
        warn!("[Proxy] Missing GITHUB_TOKEN in environment");
        ApiError::MissingCredential("Server misconfiguration: Missing GitHub token".to_string())
    })?;
    if !state.config.github.serves(&url) {
        warn!(%url, "[Proxy] Refusing URL outside the video repository");
        return Err(ApiError::bad_request("Video URL must point at the video repository"));
    }

    info!(%url, "[Proxy] Fetching video");
    let proxy = &state.config.proxy;
    let policy = RetryPolicy::linear("Proxy", proxy.max_attempts, proxy.video_delay);
    let video = retry(&policy, |_| fetch_video(&state.http, &url, token)).await?;

    let content_type = video
        .content_type
        .and_then(|ct| HeaderValue::from_str(&ct).ok())
        .unwrap_or_else(|| HeaderValue::from_static("video/mp4"));
    info!(%url, bytes = video.body.len(), "[Proxy] Successfully fetched video");
    Ok((StatusCode::OK, permissive_headers(content_type), video.body).into_response())
}

async fn fetch_video(
    http: &reqwest::Client,
    url: &str,
    token: &str,
) -> Result<FetchedVideo, AttemptError<VideoFetchError>> {
    let response = no_cache(http.get(url))
        .header(reqwest::header::AUTHORIZATION, format!("token {token}"))
        .send()
        .await
        .map_err(|e| AttemptError::Retry(VideoFetchError::Transport(e.to_string())))?;

    let status = response.status();
    if !status.is_success() {
        return Err(VideoFetchError::from_status(status.as_u16()));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response
        .bytes()
        .await
        .map_err(|e| AttemptError::Retry(VideoFetchError::Transport(e.to_string())))?;
    Ok(FetchedVideo { content_type, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_status_policy() {
        assert!(matches!(
            VideoFetchError::from_status(401),
            AttemptError::Abort(VideoFetchError::Unauthorized)
        ));
        assert!(matches!(
            VideoFetchError::from_status(403),
            AttemptError::Abort(VideoFetchError::Forbidden)
        ));
        assert!(matches!(
            VideoFetchError::from_status(404),
            AttemptError::Retry(VideoFetchError::NotFound)
        ));
        assert!(matches!(
            VideoFetchError::from_status(502),
            AttemptError::Retry(VideoFetchError::Status(502))
        ));
    }

    #[test]
    fn exhausted_errors_map_to_statuses() {
        let cases = [
            (VideoFetchError::Unauthorized, StatusCode::INTERNAL_SERVER_ERROR),
            (VideoFetchError::NotFound, StatusCode::NOT_FOUND),
            (VideoFetchError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (VideoFetchError::Status(503), StatusCode::SERVICE_UNAVAILABLE),
            (VideoFetchError::Transport("reset".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status_code(), status);
        }
    }
}
