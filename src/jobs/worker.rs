//! Export worker pool
//!
//! Runs a fixed number of concurrent workers that claim tasks from the
//! durable queue. Lanes are polled on a weighted round-robin schedule so
//! export work gets most of the capacity without starving the default
//! lane. Each task runs under its own timeout; shutdown cancels the
//! claim loops and grants in-flight tasks a grace period to finish.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::db::export_repository::ExportRepository;
use crate::db::queue_repository::QueueRepository;
use crate::db::DbPool;
use crate::jobs::processor::{self, ProcessOutcome};
use crate::models::{ExportStatus, Lane, QueueTask, TaskStatus};

pub struct WorkerPool {
    db: DbPool,
    config: AppConfig,
    shutdown: CancellationToken,
}

impl WorkerPool {
    pub fn new(db: DbPool, config: AppConfig) -> Self {
        Self {
            db,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops the pool when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run the pool until the shutdown token fires
    ///
    /// Returns once every worker has drained, or after the configured
    /// grace period if some are still busy.
    pub async fn run(self) {
        let concurrency = self.config.worker.concurrency;
        let schedule = lane_schedule(
            self.config.worker.export_lane_weight,
            self.config.worker.default_lane_weight,
        );

        tracing::info!(
            concurrency,
            export_weight = self.config.worker.export_lane_weight,
            default_weight = self.config.worker.default_lane_weight,
            "Starting export worker pool"
        );

        let mut handles = Vec::with_capacity(concurrency);
        for worker_id in 0..concurrency {
            let worker = Worker {
                id: worker_id,
                db: self.db.clone(),
                export_dir: self.config.export.export_dir.clone(),
                poll_interval: Duration::from_millis(self.config.worker.poll_interval_ms),
                backoff_base_secs: self.config.worker.retry_backoff_secs,
                schedule: schedule.clone(),
                shutdown: self.shutdown.clone(),
            };
            handles.push(tokio::spawn(worker.run()));
        }

        self.shutdown.cancelled().await;
        tracing::info!("Shutdown requested, draining workers");

        let grace = Duration::from_secs(self.config.worker.shutdown_grace_secs);
        let drain = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(grace, drain).await.is_err() {
            tracing::warn!(
                grace_secs = self.config.worker.shutdown_grace_secs,
                "Grace period elapsed with tasks still in flight"
            );
        } else {
            tracing::info!("Worker pool drained");
        }
    }
}

/// Build the weighted lane polling order
fn lane_schedule(export_weight: u32, default_weight: u32) -> Vec<Lane> {
    let mut schedule = Vec::with_capacity((export_weight + default_weight).max(1) as usize);
    schedule.extend(std::iter::repeat(Lane::Exports).take(export_weight.max(1) as usize));
    schedule.extend(std::iter::repeat(Lane::Default).take(default_weight as usize));
    schedule
}

struct Worker {
    id: usize,
    db: DbPool,
    export_dir: PathBuf,
    poll_interval: Duration,
    backoff_base_secs: i64,
    schedule: Vec<Lane>,
    shutdown: CancellationToken,
}

impl Worker {
    async fn run(self) {
        tracing::debug!(worker_id = self.id, "Worker started");
        let mut slot = 0usize;

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            match self.claim_next(&mut slot).await {
                Some(task) => self.handle_task(task).await,
                None => {
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
            }
        }

        tracing::debug!(worker_id = self.id, "Worker stopped");
    }

    /// Try the scheduled lane first, then fall back to the other one so
    /// an idle lane never blocks a busy one
    async fn claim_next(&self, slot: &mut usize) -> Option<QueueTask> {
        let queue = QueueRepository::new(&self.db);
        let preferred = self.schedule[*slot % self.schedule.len()];
        *slot = slot.wrapping_add(1);

        let fallback = match preferred {
            Lane::Exports => Lane::Default,
            Lane::Default => Lane::Exports,
        };

        for lane in [preferred, fallback] {
            match queue.claim(lane, Utc::now()).await {
                Ok(Some(task)) => return Some(task),
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(worker_id = self.id, error = %e, "Failed to claim task");
                    return None;
                }
            }
        }
        None
    }

    async fn handle_task(&self, task: QueueTask) {
        tracing::info!(
            worker_id = self.id,
            task_id = %task.id,
            export_id = %task.export_id,
            attempt = task.attempts,
            max_attempts = task.max_attempts,
            "Processing task"
        );

        let timeout = Duration::from_secs(task.timeout_secs.max(1) as u64);
        let result = tokio::time::timeout(
            timeout,
            processor::process_task(&self.db, &self.export_dir, &task),
        )
        .await;

        let queue = QueueRepository::new(&self.db);
        match result {
            Ok(Ok(ProcessOutcome::Done)) => {
                if let Err(e) = queue.complete(task.id).await {
                    tracing::error!(task_id = %task.id, error = %e, "Failed to complete task");
                }
            }
            Ok(Ok(ProcessOutcome::Unprocessable)) => {
                if let Err(e) = queue.kill(task.id, "Export job not found").await {
                    tracing::error!(task_id = %task.id, error = %e, "Failed to kill task");
                }
            }
            Ok(Err(e)) => {
                self.record_failure(&task, &format!("{:#}", e)).await;
            }
            Err(_) => {
                let message = format!("Task timed out after {}s", task.timeout_secs);
                // The processor was cancelled mid-flight, so it could not
                // settle the job itself.
                if let Err(e) = ExportRepository::new(&self.db)
                    .update_status(task.export_id, ExportStatus::Failed, Some(&message))
                    .await
                {
                    tracing::error!(export_id = %task.export_id, error = %e,
                        "Failed to mark timed-out export as failed");
                }
                self.record_failure(&task, &message).await;
            }
        }
    }

    async fn record_failure(&self, task: &QueueTask, message: &str) {
        let queue = QueueRepository::new(&self.db);
        match queue.fail(task, message, self.backoff_base_secs).await {
            Ok(TaskStatus::Queued) => {
                tracing::warn!(
                    task_id = %task.id,
                    attempt = task.attempts,
                    max_attempts = task.max_attempts,
                    error = %message,
                    "Task failed, retry scheduled"
                );
            }
            Ok(_) => {
                tracing::error!(
                    task_id = %task.id,
                    attempts = task.attempts,
                    error = %message,
                    "Task exhausted its attempts and was parked"
                );
            }
            Err(e) => {
                tracing::error!(task_id = %task.id, error = %e, "Failed to record task failure");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lane_schedule_follows_weights() {
        let schedule = lane_schedule(5, 1);
        assert_eq!(schedule.len(), 6);
        assert_eq!(
            schedule.iter().filter(|l| **l == Lane::Exports).count(),
            5
        );
        assert_eq!(schedule.last(), Some(&Lane::Default));
    }

    #[test]
    fn test_lane_schedule_never_empty() {
        let schedule = lane_schedule(0, 0);
        assert!(!schedule.is_empty());
    }
}
