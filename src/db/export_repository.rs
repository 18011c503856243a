//! Export job repository
//!
//! Export jobs record the lifecycle of an asynchronous export request.
//! Status transitions are guarded in SQL: a job that has reached a
//! terminal state (`completed` or `failed`) can never move again.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::parse_db_timestamp;
use crate::models::{ExportFormat, ExportJob, ExportScope, ExportStatus};

/// Default and maximum page sizes for export listings
pub const DEFAULT_LIST_LIMIT: i64 = 50;
pub const MAX_LIST_LIMIT: i64 = 200;

#[derive(Debug, sqlx::FromRow)]
struct ExportJobRow {
    id: String,
    organization_id: String,
    user_id: String,
    format: String,
    scope: String,
    status: String,
    file_path: Option<String>,
    error: Option<String>,
    created_at: String,
    updated_at: String,
    completed_at: Option<String>,
}

const EXPORT_COLUMNS: &str = "id, organization_id, user_id, format, scope, status, \
                              file_path, error, created_at, updated_at, completed_at";

pub struct ExportRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ExportRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, job: &ExportJob) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO export_jobs (id, organization_id, user_id, format, scope, status,
                                     created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(job.id.to_string())
        .bind(job.organization_id.to_string())
        .bind(job.user_id.to_string())
        .bind(job.format.as_str())
        .bind(job.scope.as_str())
        .bind(job.status.as_str())
        .bind(job.created_at.to_rfc3339())
        .bind(job.updated_at.to_rfc3339())
        .execute(self.pool)
        .await
        .context("Failed to create export job")?;

        Ok(())
    }

    /// Unscoped lookup, used by the worker which acts across tenants
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<ExportJob>> {
        let row = sqlx::query_as::<_, ExportJobRow>(&format!(
            "SELECT {} FROM export_jobs WHERE id = ?",
            EXPORT_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await
        .context("Failed to get export job")?;

        row.map(row_to_export_job).transpose()
    }

    /// Tenant-scoped lookup; a job owned by another organization is
    /// indistinguishable from an absent one
    pub async fn get_for_organization(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<ExportJob>> {
        let row = sqlx::query_as::<_, ExportJobRow>(&format!(
            "SELECT {} FROM export_jobs WHERE organization_id = ? AND id = ?",
            EXPORT_COLUMNS
        ))
        .bind(organization_id.to_string())
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await
        .context("Failed to get export job")?;

        row.map(row_to_export_job).transpose()
    }

    /// Newest-first listing with a clamped page size
    pub async fn list_for_organization(
        &self,
        organization_id: Uuid,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<ExportJob>> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        let offset = offset.unwrap_or(0).max(0);

        let rows = sqlx::query_as::<_, ExportJobRow>(&format!(
            "SELECT {} FROM export_jobs WHERE organization_id = ? \
             ORDER BY created_at DESC LIMIT ? OFFSET ?",
            EXPORT_COLUMNS
        ))
        .bind(organization_id.to_string())
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await
        .context("Failed to list export jobs")?;

        rows.into_iter().map(row_to_export_job).collect()
    }

    /// Transition a job to a new status
    ///
    /// Returns false when the job does not exist or is already terminal.
    /// `completed_at` is stamped only on success; `error` is recorded on
    /// failure and cleared otherwise.
    pub async fn update_status(
        &self,
        id: Uuid,
        status: ExportStatus,
        error: Option<&str>,
    ) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let completed_at = (status == ExportStatus::Completed).then(|| now.clone());

        let result = sqlx::query(
            r#"
            UPDATE export_jobs
            SET status = ?, error = ?, completed_at = ?, updated_at = ?
            WHERE id = ? AND status NOT IN ('completed', 'failed')
            "#,
        )
        .bind(status.as_str())
        .bind(error)
        .bind(completed_at)
        .bind(&now)
        .bind(id.to_string())
        .execute(self.pool)
        .await
        .context("Failed to update export job status")?;

        Ok(result.rows_affected() > 0)
    }

    /// Record the artifact path of a generated export
    pub async fn set_file_path(&self, id: Uuid, file_path: &str) -> Result<()> {
        sqlx::query("UPDATE export_jobs SET file_path = ?, updated_at = ? WHERE id = ?")
            .bind(file_path)
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(self.pool)
            .await
            .context("Failed to set export file path")?;

        Ok(())
    }
}

fn row_to_export_job(row: ExportJobRow) -> Result<ExportJob> {
    let format = row
        .format
        .parse::<ExportFormat>()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Invalid export format")?;
    let scope = row
        .scope
        .parse::<ExportScope>()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Invalid export scope")?;
    let status = row
        .status
        .parse::<ExportStatus>()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Invalid export status")?;

    Ok(ExportJob {
        id: Uuid::parse_str(&row.id).context("Invalid export job id")?,
        organization_id: Uuid::parse_str(&row.organization_id)
            .context("Invalid organization id")?,
        user_id: Uuid::parse_str(&row.user_id).context("Invalid user id")?,
        format,
        scope,
        status,
        file_path: row.file_path,
        error: row.error,
        created_at: parse_db_timestamp(&row.created_at),
        updated_at: parse_db_timestamp(&row.updated_at),
        completed_at: row.completed_at.as_deref().map(parse_db_timestamp),
    })
}
