//! Export endpoints
//!
//! Export creation is asynchronous: the POST returns 202 Accepted with
//! the job id, and the caller polls until the job reaches a terminal
//! status. The artifact download only opens once the job is completed.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::get,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::middleware::AuthContext;
use crate::models::{CreateExportRequest, CreateExportResponse, ExportJob, ExportStatus};
use crate::services::ExportService;
use crate::utils::{AppError, AppResult};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_export).get(list_exports))
        .route("/{id}", get(get_export))
        .route("/{id}/download", get(download_export))
}

#[derive(Debug, Deserialize, Default)]
struct ExportListQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

/// Queue a new export job
///
/// Requires a user credential: API-key contexts can ingest data but may
/// not trigger exports.
async fn create_export(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(request): Json<CreateExportRequest>,
) -> AppResult<(StatusCode, Json<CreateExportResponse>)> {
    let user_id = ctx
        .user_id()
        .ok_or_else(|| AppError::forbidden("Exports require a user credential"))?;

    let service = ExportService::new(state.db.clone(), &state.config.worker);
    let job = service
        .create(ctx.organization_id, user_id, &request)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateExportResponse {
            export_id: job.id,
            status: job.status,
            message: "Export queued for processing".to_string(),
        }),
    ))
}

async fn list_exports(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(query): Query<ExportListQuery>,
) -> AppResult<Json<Vec<ExportJob>>> {
    let service = ExportService::new(state.db.clone(), &state.config.worker);
    let jobs = service
        .list(ctx.organization_id, query.limit, query.offset)
        .await?;
    Ok(Json(jobs))
}

async fn get_export(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ExportJob>> {
    let service = ExportService::new(state.db.clone(), &state.config.worker);
    let job = service.get(ctx.organization_id, id).await?;
    Ok(Json(job))
}

/// Stream a completed export artifact
async fn download_export(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
) -> AppResult<(HeaderMap, Body)> {
    let service = ExportService::new(state.db.clone(), &state.config.worker);
    let job = service.get(ctx.organization_id, id).await?;

    if job.status != ExportStatus::Completed {
        return Err(AppError::bad_request(format!(
            "Export is not ready for download (status: {})",
            job.status.as_str()
        )));
    }

    let file_path = job
        .file_path
        .as_deref()
        .ok_or_else(|| AppError::internal("Completed export has no artifact path"))?;

    let file = tokio::fs::File::open(file_path).await.map_err(|e| {
        tracing::error!(export_id = %job.id, file_path, error = %e,
            "Export artifact missing on disk");
        AppError::internal("Export artifact is unavailable")
    })?;

    let filename = std::path::Path::new(file_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("export_{}.{}", job.id, job.format.extension()));

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(job.format.content_type()),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
            .map_err(|_| AppError::internal("Invalid artifact filename"))?,
    );

    Ok((headers, Body::from_stream(ReaderStream::new(file))))
}
