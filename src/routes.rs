use axum::{
    extract::{rejection::JsonRejection, Json, Query, State},
    http::StatusCode,
    response::Html,
    routing::get,
    routing::post,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::audit::{self, AuditReport, RegenerationReport};
use crate::error::{ApiError, ApiResult};
use crate::files::{video_by_name, video_by_query};
use crate::generator::Generated;
use crate::models::{filter_videos, GenerateVideoRequest, VideoRecord};
use crate::page::INDEX_HTML;
use crate::proxy::{proxy_json, proxy_video};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    let api = Router::new()
        .route("/videos", get(list_videos))
        .route("/generate-video", post(generate_video))
        .route("/refresh-videos", get(refresh_videos))
        .route("/check-videos", get(check_videos).post(regenerate_missing))
        .route("/proxy-json", get(proxy_json))
        .route("/proxy-video", get(proxy_video))
        .route("/video", get(video_by_query));

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/videos/:file", get(video_by_name))
        .nest("/api", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: Option<String>,
}

/// `GET /api/videos?q=`
async fn list_videos(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Value>> {
    let catalog = state.store.load().await?;
    let videos = filter_videos(query.q.as_deref().unwrap_or_default(), &catalog.videos);
    Ok(Json(json!({ "videos": videos })))
}

/// `POST /api/generate-video`
async fn generate_video(
    State(state): State<AppState>,
    payload: Result<Json<GenerateVideoRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<VideoRecord>)> {
    let Json(request) =
        payload.map_err(|e| ApiError::bad_request(format!("Invalid request body: {e}")))?;
    match state.generator.submit(&request).await? {
        Generated::Completed(record) => Ok((StatusCode::OK, Json(record))),
        Generated::Queued(record) => Ok((StatusCode::ACCEPTED, Json(record))),
    }
}

/// `GET /api/refresh-videos`
async fn refresh_videos(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let catalog = state
        .store
        .refresh()
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    tracing::info!(count = catalog.videos.len(), "[RefreshVideos] fetched videos");
    Ok(Json(json!({ "videos": catalog.videos })))
}

/// `GET /api/check-videos`
async fn check_videos(State(state): State<AppState>) -> ApiResult<Json<AuditReport>> {
    Ok(Json(audit::audit(state.store.as_ref()).await?))
}

/// `POST /api/check-videos`
async fn regenerate_missing(State(state): State<AppState>) -> ApiResult<Json<RegenerationReport>> {
    let report = audit::audit(state.store.as_ref()).await?;
    if report.up_to_date {
        tracing::info!("All videos are up-to-date. Skipping regeneration.");
        return Ok(Json(RegenerationReport::default()));
    }
    Ok(Json(audit::regenerate(&state.generator, &report.missing).await))
}
