use std::path::PathBuf;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use mediasort_core::PendingStatus;
use mediasort_db::repo::pending_files::{self, PendingFileRow};
use mediasort_db::repo::processed_files::{self, ProcessedFileRow, StatusCounts};
use mediasort_metadata::{MediaMetadata, QueryKind};
use mediasort_organizer::ProcessingOutcome;
use mediasort_organizer::pipeline::ApprovedMedia;
use mediasort_organizer::status::StatusSummary;
use mediasort_scheduler::JobInfo;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::downloads::{self, DownloadListing};
use crate::error::ApiError;
use crate::jobs::{self, JobKind};
use crate::state::AppState;

const DEFAULT_HISTORY_LIMIT: i64 = 50;
const MAX_HISTORY_LIMIT: i64 = 500;
const STATUS_RECENT: usize = 20;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_router() -> Router<AppState> {
    Router::new()
        .route("/status", get(status))
        .route("/history", get(history))
        .route("/jobs", get(list_jobs).post(create_job))
        .route("/jobs/{name}", delete(delete_job))
        .route("/scan", post(trigger_scan))
        .route("/approve", post(approve))
        .route("/pending", get(list_pending))
        .route("/pending/{id}/approve", post(approve_pending))
        .route("/pending/{id}/reject", post(reject_pending))
        .route("/search", post(search))
        .route("/downloads", get(list_downloads))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    sqlx::query("SELECT 1")
        .execute(&state.db)
        .await
        .map_err(|e| ApiError::Internal(format!("database check failed: {e}")))?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
    }))
}

// ---------------------------------------------------------------------------
// Status and history
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct StatusResponse {
    session: StatusSummary,
    records: StatusCounts,
}

async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let records = processed_files::status_counts(&state.db).await?;
    Ok(Json(StatusResponse {
        session: state.organizer.status_log().summary(STATUS_RECENT),
        records,
    }))
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<i64>,
}

async fn history(
    State(state): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<Vec<ProcessedFileRow>>, ApiError> {
    let limit = q
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let rows = processed_files::list_recent(&state.db, limit).await?;
    Ok(Json(rows))
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

async fn list_jobs(State(state): State<AppState>) -> Json<Vec<JobInfo>> {
    Json(state.scheduler.list())
}

#[derive(Deserialize)]
struct CreateJobRequest {
    name: String,
    kind: JobKind,
    cron: String,
    directory: Option<PathBuf>,
}

async fn create_job(
    State(state): State<AppState>,
    Json(req): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<JobInfo>), ApiError> {
    let action = jobs::action_for(&state.organizer, req.kind, req.directory);
    state.scheduler.schedule(&req.name, &req.cron, action)?;

    let name = req.name.trim();
    let info = state
        .scheduler
        .list()
        .into_iter()
        .find(|j| j.name == name)
        .ok_or_else(|| ApiError::Internal(format!("job {name} vanished after scheduling")))?;
    Ok((StatusCode::CREATED, Json(info)))
}

async fn delete_job(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.scheduler.cancel(&name) {
        return Err(ApiError::NotFound(format!("job {name}")));
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}

// ---------------------------------------------------------------------------
// Processing
// ---------------------------------------------------------------------------

async fn trigger_scan(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let organizer = state.organizer.clone();
    let cancel = state.shutdown.child_token();
    tokio::spawn(jobs::run_scan(organizer, cancel));
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "accepted" })),
    )
}

#[derive(Deserialize)]
struct ApproveRequest {
    path: PathBuf,
    #[serde(flatten)]
    media: ApprovedMedia,
}

async fn approve(
    State(state): State<AppState>,
    Json(req): Json<ApproveRequest>,
) -> Result<Json<ProcessingOutcome>, ApiError> {
    if !req.path.is_file() {
        return Err(ApiError::NotFound(format!("file {}", req.path.display())));
    }
    let outcome = state
        .organizer
        .process_approved(&req.path, &req.media, &state.shutdown)
        .await?;
    Ok(Json(outcome))
}

// ---------------------------------------------------------------------------
// Review queue
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct PendingQuery {
    status: Option<String>,
    limit: Option<i64>,
}

/// `status` defaults to `pending`; `all` lists every entry.
async fn list_pending(
    State(state): State<AppState>,
    Query(q): Query<PendingQuery>,
) -> Result<Json<Vec<PendingFileRow>>, ApiError> {
    let status = match q.status.as_deref().map(str::trim) {
        None | Some("") => Some(PendingStatus::Pending),
        Some("all") => None,
        Some(other) => Some(
            PendingStatus::parse(other)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown status {other}")))?,
        ),
    };
    let limit = q
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let rows = pending_files::list_pending(&state.db, status, limit).await?;
    Ok(Json(rows))
}

async fn approve_pending(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(media): Json<ApprovedMedia>,
) -> Result<Json<ProcessingOutcome>, ApiError> {
    let entry = pending_files::get_pending(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("pending file {id}")))?;
    if entry.status != PendingStatus::Pending.as_str() {
        return Err(ApiError::BadRequest(format!(
            "pending file {id} is already {}",
            entry.status
        )));
    }
    let path = PathBuf::from(&entry.file_path);
    if !path.is_file() {
        return Err(ApiError::NotFound(format!("file {}", path.display())));
    }
    let outcome = state
        .organizer
        .process_approved(&path, &media, &state.shutdown)
        .await?;
    Ok(Json(outcome))
}

#[derive(Deserialize)]
struct RejectRequest {
    #[serde(default)]
    notes: Option<String>,
}

async fn reject_pending(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<RejectRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let notes = req.notes.as_deref().map(str::trim).filter(|n| !n.is_empty());
    if !pending_files::set_pending_status(&state.db, &id, PendingStatus::Rejected, notes).await? {
        return Err(ApiError::NotFound(format!("pending file {id}")));
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum SearchKind {
    Movie,
    Series,
}

impl From<SearchKind> for QueryKind {
    fn from(kind: SearchKind) -> Self {
        match kind {
            SearchKind::Movie => QueryKind::Movie,
            SearchKind::Series => QueryKind::Series,
        }
    }
}

#[derive(Deserialize)]
struct SearchRequest {
    kind: SearchKind,
    title: String,
    year: Option<i32>,
}

async fn search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<MediaMetadata>, ApiError> {
    state
        .organizer
        .search_metadata(req.kind.into(), &req.title, req.year, &state.shutdown)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no metadata for {}", req.title.trim())))
}

// ---------------------------------------------------------------------------
// Downloads
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct DownloadsQuery {
    path: Option<String>,
}

async fn list_downloads(
    State(state): State<AppState>,
    Query(q): Query<DownloadsQuery>,
) -> Result<Json<DownloadListing>, ApiError> {
    let folder = downloads::resolve_folder(&state.settings, q.path.as_deref()).await?;
    let listing = downloads::list_folder(&state.settings, &folder).await?;
    Ok(Json(listing))
}
