//! Export task processing
//!
//! Runs one claimed queue task to completion: load the export job, mark
//! it processing, collect the organization's data, serialize it with the
//! requested codec, and write the artifact. Any failure marks the job
//! failed and propagates the error so the queue can account the attempt.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;

use crate::db::chat_repository::ChatRepository;
use crate::db::export_repository::ExportRepository;
use crate::db::message_repository::MessageRepository;
use crate::db::DbPool;
use crate::models::{ExportJob, ExportStatus, QueueTask, TaskKind};
use crate::services::{ExportBatch, ExportCodec};

/// Outcome of processing a task
#[derive(Debug, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Task did its work (or had none left to do)
    Done,
    /// Task references a job that does not exist; retrying cannot help
    Unprocessable,
}

/// Process one claimed task
pub async fn process_task(
    pool: &DbPool,
    export_dir: &Path,
    task: &QueueTask,
) -> Result<ProcessOutcome> {
    match task.kind {
        TaskKind::GenerateExport => process_export(pool, export_dir, task).await,
    }
}

async fn process_export(
    pool: &DbPool,
    export_dir: &Path,
    task: &QueueTask,
) -> Result<ProcessOutcome> {
    let exports = ExportRepository::new(pool);

    let job = match exports.get_by_id(task.export_id).await? {
        Some(job) => job,
        None => {
            tracing::error!(export_id = %task.export_id, "Task references unknown export job");
            return Ok(ProcessOutcome::Unprocessable);
        }
    };

    // A terminal job means a previous attempt already settled it; the
    // status machine is monotonic, so there is nothing left to do.
    if job.status.is_terminal() {
        tracing::info!(
            export_id = %job.id,
            status = job.status.as_str(),
            "Export job already settled, skipping"
        );
        return Ok(ProcessOutcome::Done);
    }

    exports
        .update_status(job.id, ExportStatus::Processing, None)
        .await?;

    match generate_artifact(pool, export_dir, &job).await {
        Ok(file_path) => {
            exports.set_file_path(job.id, &file_path).await?;
            exports
                .update_status(job.id, ExportStatus::Completed, None)
                .await?;
            tracing::info!(export_id = %job.id, file_path = %file_path, "Export completed");
            Ok(ProcessOutcome::Done)
        }
        Err(e) => {
            let message = format!("{:#}", e);
            tracing::error!(export_id = %job.id, error = %message, "Export failed");
            exports
                .update_status(job.id, ExportStatus::Failed, Some(&message))
                .await?;
            Err(e)
        }
    }
}

/// Collect, serialize and write the export artifact
async fn generate_artifact(pool: &DbPool, export_dir: &Path, job: &ExportJob) -> Result<String> {
    let chats = ChatRepository::new(pool)
        .list_for_export(job.organization_id)
        .await?;

    let chats = if job.scope.includes_messages() {
        let messages = MessageRepository::new(pool);
        let mut loaded = Vec::with_capacity(chats.len());
        for mut chat in chats {
            chat.messages = messages.list_for_chat(chat.id).await?;
            loaded.push(chat);
        }
        loaded
    } else {
        chats
    };

    let batch = ExportBatch {
        organization_id: job.organization_id,
        export_date: Utc::now(),
        scope: job.scope,
        chats,
    };

    let bytes = ExportCodec::from(job.format).serialize(&batch)?;

    let file_path = artifact_path(export_dir, job);
    if let Some(parent) = file_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create export directory {:?}", parent))?;
    }
    tokio::fs::write(&file_path, &bytes)
        .await
        .with_context(|| format!("Failed to write export artifact {:?}", file_path))?;

    Ok(file_path.to_string_lossy().into_owned())
}

fn artifact_path(export_dir: &Path, job: &ExportJob) -> PathBuf {
    let filename = format!(
        "export_{}_{}.{}",
        job.organization_id,
        Utc::now().format("%Y%m%d%H%M%S"),
        job.format.extension()
    );
    export_dir.join(filename)
}
