//! Durable task queue repository
//!
//! The queue lives in SQLite next to the data it references, so enqueue
//! and job-store writes share one database and one crash domain. Workers
//! claim tasks with a lease: a single `UPDATE ... RETURNING` statement
//! atomically picks the oldest runnable task on a lane, bumps its attempt
//! counter and stamps a lease deadline. A worker that dies mid-task
//! leaves an expired lease behind, and the task becomes claimable again.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::parse_db_timestamp;
use crate::models::{Lane, QueueTask, TaskKind, TaskStatus};

#[derive(Debug, sqlx::FromRow)]
struct QueueTaskRow {
    id: String,
    lane: String,
    kind: String,
    export_id: String,
    attempts: i64,
    max_attempts: i64,
    timeout_secs: i64,
    status: String,
    last_error: Option<String>,
    available_at: String,
    lease_expires_at: Option<String>,
    created_at: String,
    updated_at: String,
}

const TASK_COLUMNS: &str = "id, lane, kind, export_id, attempts, max_attempts, timeout_secs, \
                            status, last_error, available_at, lease_expires_at, created_at, \
                            updated_at";

pub struct QueueRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> QueueRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Enqueue a new task, immediately runnable
    pub async fn enqueue(
        &self,
        kind: TaskKind,
        export_id: Uuid,
        max_attempts: i64,
        timeout_secs: i64,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO queue_tasks (id, lane, kind, export_id, attempts, max_attempts,
                                     timeout_secs, status, available_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, 0, ?, ?, 'queued', ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(kind.lane().as_str())
        .bind(kind.as_str())
        .bind(export_id.to_string())
        .bind(max_attempts)
        .bind(timeout_secs)
        .bind(&now)
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await
        .context("Failed to enqueue task")?;

        Ok(id)
    }

    /// Claim the oldest runnable task on a lane
    ///
    /// A task is runnable when it is queued and due, or when it is marked
    /// running but its lease has expired (the previous worker crashed or
    /// was killed). Claiming counts as an attempt either way.
    pub async fn claim(&self, lane: Lane, now: DateTime<Utc>) -> Result<Option<QueueTask>> {
        let row = sqlx::query_as::<_, QueueTaskRow>(&format!(
            r#"
            UPDATE queue_tasks
            SET status = 'running',
                attempts = attempts + 1,
                lease_expires_at = datetime(?, '+' || timeout_secs || ' seconds'),
                updated_at = ?
            WHERE id = (
                SELECT id FROM queue_tasks
                WHERE lane = ?
                  AND available_at <= ?
                  AND (status = 'queued'
                       OR (status = 'running' AND lease_expires_at <= datetime(?)))
                ORDER BY available_at ASC, created_at ASC
                LIMIT 1
            )
            RETURNING {}
            "#,
            TASK_COLUMNS
        ))
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(lane.as_str())
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .fetch_optional(self.pool)
        .await
        .context("Failed to claim task")?;

        row.map(row_to_task).transpose()
    }

    /// Mark a task done after successful processing
    pub async fn complete(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE queue_tasks
            SET status = 'done', lease_expires_at = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(self.pool)
        .await
        .context("Failed to complete task")?;

        Ok(())
    }

    /// Record a failed attempt
    ///
    /// While attempts remain, the task is re-queued with exponential
    /// backoff (`backoff_base_secs * 2^(attempts-1)`). Once max_attempts
    /// is reached the task is parked as dead for inspection.
    pub async fn fail(
        &self,
        task: &QueueTask,
        error: &str,
        backoff_base_secs: i64,
    ) -> Result<TaskStatus> {
        let now = Utc::now();

        if task.retryable() {
            let exponent = (task.attempts - 1).clamp(0, 16) as u32;
            let delay = Duration::seconds(backoff_base_secs.saturating_mul(1i64 << exponent));
            let available_at = now + delay;

            sqlx::query(
                r#"
                UPDATE queue_tasks
                SET status = 'queued', last_error = ?, available_at = ?,
                    lease_expires_at = NULL, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(error)
            .bind(available_at.to_rfc3339())
            .bind(now.to_rfc3339())
            .bind(task.id.to_string())
            .execute(self.pool)
            .await
            .context("Failed to reschedule task")?;

            Ok(TaskStatus::Queued)
        } else {
            sqlx::query(
                r#"
                UPDATE queue_tasks
                SET status = 'dead', last_error = ?, lease_expires_at = NULL, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(error)
            .bind(now.to_rfc3339())
            .bind(task.id.to_string())
            .execute(self.pool)
            .await
            .context("Failed to park dead task")?;

            Ok(TaskStatus::Dead)
        }
    }

    /// Park a task as dead regardless of remaining attempts
    ///
    /// Used for non-retryable failures such as a task referencing an
    /// export job that no longer exists.
    pub async fn kill(&self, id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE queue_tasks
            SET status = 'dead', last_error = ?, lease_expires_at = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(error)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(self.pool)
        .await
        .context("Failed to kill task")?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<QueueTask>> {
        let row = sqlx::query_as::<_, QueueTaskRow>(&format!(
            "SELECT {} FROM queue_tasks WHERE id = ?",
            TASK_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await
        .context("Failed to get task")?;

        row.map(row_to_task).transpose()
    }
}

fn row_to_task(row: QueueTaskRow) -> Result<QueueTask> {
    let lane = row
        .lane
        .parse::<Lane>()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Invalid queue lane")?;
    let kind = row
        .kind
        .parse::<TaskKind>()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Invalid task kind")?;
    let status = row
        .status
        .parse::<TaskStatus>()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Invalid task status")?;

    Ok(QueueTask {
        id: Uuid::parse_str(&row.id).context("Invalid task id")?,
        lane,
        kind,
        export_id: Uuid::parse_str(&row.export_id).context("Invalid export id")?,
        attempts: row.attempts,
        max_attempts: row.max_attempts,
        timeout_secs: row.timeout_secs,
        status,
        last_error: row.last_error,
        available_at: parse_db_timestamp(&row.available_at),
        lease_expires_at: row.lease_expires_at.as_deref().map(parse_db_timestamp),
        created_at: parse_db_timestamp(&row.created_at),
        updated_at: parse_db_timestamp(&row.updated_at),
    })
}
