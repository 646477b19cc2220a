//! Ad hoc download job routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{CreateJobRequest, JobResponse, LogLineResponse};
use crate::api::routes::archive::{build_archive_zip, zip_response};
use crate::api::server::AppState;

/// Create the jobs router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_jobs).post(create_job))
        .route("/{id}", get(get_job))
        .route("/{id}/logs", get(get_job_logs))
        .route("/{id}/archive", get(download_job_archive))
}

/// List all jobs, newest first.
async fn list_jobs(State(state): State<AppState>) -> ApiResult<Json<Vec<JobResponse>>> {
    let runner = state
        .jobs
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Job service not available"))?;

    let jobs = runner
        .registry()
        .all()
        .into_iter()
        .map(|job| JobResponse::from(&*job.read()))
        .collect();
    Ok(Json(jobs))
}

/// Start a single-URL download job.
async fn create_job(
    State(state): State<AppState>,
    Json(request): Json<CreateJobRequest>,
) -> ApiResult<(StatusCode, Json<JobResponse>)> {
    if request.url.trim().is_empty() {
        return Err(ApiError::validation("URL cannot be empty"));
    }

    let runner = state
        .jobs
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Job service not available"))?;

    let (id, _done) = runner.start_job(&request.url).await.map_err(ApiError::from)?;

    let job = runner
        .registry()
        .get(&id)
        .ok_or_else(|| ApiError::internal("Job vanished after creation"))?;
    let response = JobResponse::from(&*job.read());
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// Get one job.
async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobResponse>> {
    let runner = state
        .jobs
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Job service not available"))?;

    let job = runner
        .registry()
        .get(&id)
        .ok_or_else(|| ApiError::not_found(format!("Job with id '{id}' not found")))?;
    Ok(Json(JobResponse::from(&*job.read())))
}

/// Get the captured downloader log tail for a job.
async fn get_job_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<LogLineResponse>>> {
    let runner = state
        .jobs
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Job service not available"))?;

    let job = runner
        .registry()
        .get(&id)
        .ok_or_else(|| ApiError::not_found(format!("Job with id '{id}' not found")))?;
    let lines = job.read().logs.iter().map(LogLineResponse::from).collect();
    Ok(Json(lines))
}

/// Download the job's content as a flat ZIP archive.
async fn download_job_archive(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<axum::response::Response> {
    let runner = state
        .jobs
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Job service not available"))?;

    let job = runner
        .registry()
        .get(&id)
        .ok_or_else(|| ApiError::not_found(format!("Job with id '{id}' not found")))?;
    let dir = job.read().dir.clone();

    if !dir.exists() {
        return Err(ApiError::not_found("No downloaded content to archive"));
    }

    let bytes = build_archive_zip(&dir)?;
    Ok(zip_response(&format!("{id}.zip"), bytes))
}
