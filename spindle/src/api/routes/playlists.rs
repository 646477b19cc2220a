//! Playlist management routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use tracing::warn;

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{
    AddPlaylistRequest, LogLineResponse, PlaylistDetailResponse, PlaylistSummaryResponse,
};
use crate::api::routes::archive::{build_archive_zip, zip_response};
use crate::api::server::AppState;

/// Create the playlists router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_playlists).post(add_playlist))
        .route("/{id}", get(get_playlist))
        .route("/{id}/sync", post(start_sync))
        .route("/{id}/refresh", post(refresh_metadata))
        .route("/{id}/logs", get(get_logs))
        .route("/{id}/archive", get(download_archive))
}

/// List all tracked playlists.
async fn list_playlists(State(state): State<AppState>) -> Json<Vec<PlaylistSummaryResponse>> {
    let summaries = state
        .registry
        .summaries()
        .into_iter()
        .map(PlaylistSummaryResponse::from)
        .collect();
    Json(summaries)
}

/// Track a new playlist by URL.
///
/// The identifier is extracted from the URL, the entry is created (idempotent
/// if already tracked), and an initial metadata refresh is fired without
/// blocking the response.
async fn add_playlist(
    State(state): State<AppState>,
    Json(request): Json<AddPlaylistRequest>,
) -> ApiResult<(StatusCode, Json<PlaylistDetailResponse>)> {
    if request.url.trim().is_empty() {
        return Err(ApiError::validation("URL cannot be empty"));
    }

    let provider = state
        .provider
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Metadata service not available"))?;

    let id = provider
        .extract_identifier(&request.url)
        .ok_or_else(|| ApiError::validation("Not a recognizable playlist URL"))?;

    let entry = state.registry.get_or_create(&id, &request.url, true);

    if let Some(refresher) = state.refresher.clone() {
        tokio::spawn(async move {
            if let Err(e) = refresher.refresh(&id).await {
                warn!(playlist = %id, error = %e, "Initial refresh for added playlist failed");
            }
        });
    }

    let response = PlaylistDetailResponse::from(&*entry.read());
    Ok((StatusCode::CREATED, Json(response)))
}

/// Get full playlist detail including tracks.
async fn get_playlist(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PlaylistDetailResponse>> {
    let entry = state
        .registry
        .get(&id)
        .ok_or_else(|| ApiError::not_found(format!("Playlist with id '{id}' not found")))?;
    let response = PlaylistDetailResponse::from(&*entry.read());
    Ok(Json(response))
}

/// Start a sync for the playlist.
async fn start_sync(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let supervisor = state
        .supervisor
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Sync service not available"))?;

    // The completion receiver is dropped: the route reports "started", the
    // supervisor finishes in the background.
    let _ = supervisor.start_sync(&id).await.map_err(ApiError::from)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "id": id, "status": "syncing" })),
    ))
}

/// Trigger a metadata refresh and return the refreshed detail.
async fn refresh_metadata(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PlaylistDetailResponse>> {
    let refresher = state
        .refresher
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Metadata service not available"))?;

    refresher.refresh(&id).await.map_err(ApiError::from)?;

    let entry = state
        .registry
        .get(&id)
        .ok_or_else(|| ApiError::not_found(format!("Playlist with id '{id}' not found")))?;
    let response = PlaylistDetailResponse::from(&*entry.read());
    Ok(Json(response))
}

/// Get the captured downloader log tail.
async fn get_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<LogLineResponse>>> {
    let entry = state
        .registry
        .get(&id)
        .ok_or_else(|| ApiError::not_found(format!("Playlist with id '{id}' not found")))?;
    let lines = entry.read().logs.iter().map(LogLineResponse::from).collect();
    Ok(Json(lines))
}

/// Download the playlist's content as a flat ZIP archive.
async fn download_archive(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<axum::response::Response> {
    let entry = state
        .registry
        .get(&id)
        .ok_or_else(|| ApiError::not_found(format!("Playlist with id '{id}' not found")))?;
    let (dir, name) = {
        let playlist = entry.read();
        (playlist.download_dir.clone(), playlist.name.clone())
    };

    if !dir.exists() {
        return Err(ApiError::not_found("No downloaded content to archive"));
    }

    let bytes = build_archive_zip(&dir)?;
    let filename = format!("{}.zip", if name.is_empty() { &id } else { &name });
    Ok(zip_response(&filename, bytes))
}
