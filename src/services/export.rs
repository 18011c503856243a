//! Export orchestration service
//!
//! The API-side half of the export pipeline: records a pending job and
//! hands a task to the durable queue. The worker half lives in
//! `crate::jobs` and coordinates with this service only through the job
//! store and the queue.

use anyhow::Context;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::config::WorkerConfig;
use crate::db::export_repository::ExportRepository;
use crate::db::queue_repository::QueueRepository;
use crate::models::{
    CreateExportRequest, ExportJob, ExportStatus, TaskKind,
};
use crate::utils::{AppError, AppResult};

pub struct ExportService {
    pool: SqlitePool,
    max_attempts: i64,
    task_timeout_secs: i64,
}

impl ExportService {
    pub fn new(pool: SqlitePool, worker: &WorkerConfig) -> Self {
        Self {
            pool,
            max_attempts: worker.max_attempts,
            task_timeout_secs: worker.task_timeout_secs,
        }
    }

    /// Create an export job and enqueue its processing task
    ///
    /// The job is persisted as `pending` first, then a task referencing it
    /// goes on the queue. If the enqueue fails the job is marked `failed`
    /// immediately rather than left dangling as forever-pending.
    pub async fn create(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        request: &CreateExportRequest,
    ) -> AppResult<ExportJob> {
        let exports = ExportRepository::new(&self.pool);
        let queue = QueueRepository::new(&self.pool);

        let job = ExportJob::new(organization_id, user_id, request.format, request.scope);
        exports
            .create(&job)
            .await
            .context("Failed to persist export job")?;

        if let Err(e) = queue
            .enqueue(
                TaskKind::GenerateExport,
                job.id,
                self.max_attempts,
                self.task_timeout_secs,
            )
            .await
        {
            tracing::error!(export_id = %job.id, error = %e, "Failed to enqueue export task");
            exports
                .update_status(job.id, ExportStatus::Failed, Some("Failed to enqueue task"))
                .await
                .context("Failed to mark export job as failed")?;
            return Err(AppError::internal("Failed to schedule export"));
        }

        tracing::info!(
            export_id = %job.id,
            organization_id = %organization_id,
            format = %job.format.as_str(),
            scope = %job.scope.as_str(),
            "Export job enqueued"
        );

        Ok(job)
    }

    /// Fetch a job within the caller's organization
    ///
    /// A job belonging to another tenant is reported as not found.
    pub async fn get(&self, organization_id: Uuid, id: Uuid) -> AppResult<ExportJob> {
        ExportRepository::new(&self.pool)
            .get_for_organization(organization_id, id)
            .await?
            .ok_or_else(|| AppError::not_found("Export job not found"))
    }

    /// List an organization's jobs, newest first
    pub async fn list(
        &self,
        organization_id: Uuid,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> AppResult<Vec<ExportJob>> {
        Ok(ExportRepository::new(&self.pool)
            .list_for_organization(organization_id, limit, offset)
            .await?)
    }
}
