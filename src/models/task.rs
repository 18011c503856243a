//! Queue task model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Queue lane a task is scheduled on
///
/// Export work runs on a dedicated lane so that bulk jobs cannot starve
/// housekeeping tasks (and vice versa). Lanes are drained by weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    Exports,
    Default,
}

impl Lane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lane::Exports => "exports",
            Lane::Default => "default",
        }
    }
}

impl std::fmt::Display for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Lane {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exports" => Ok(Lane::Exports),
            "default" => Ok(Lane::Default),
            other => Err(format!("Unknown queue lane: {}", other)),
        }
    }
}

/// Kind of work a queue task carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Generate an export artifact for the referenced export job
    GenerateExport,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::GenerateExport => "generate_export",
        }
    }

    /// Lane this kind of work is scheduled on
    pub fn lane(&self) -> Lane {
        match self {
            TaskKind::GenerateExport => Lane::Exports,
        }
    }
}

impl std::str::FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generate_export" => Ok(TaskKind::GenerateExport),
            other => Err(format!("Unknown task kind: {}", other)),
        }
    }
}

/// Lifecycle state of a queue task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Running,
    Done,
    Dead,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Done => "done",
            TaskStatus::Dead => "dead",
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(TaskStatus::Queued),
            "running" => Ok(TaskStatus::Running),
            "done" => Ok(TaskStatus::Done),
            "dead" => Ok(TaskStatus::Dead),
            other => Err(format!("Unknown task status: {}", other)),
        }
    }
}

/// A durable unit of background work
///
/// Tasks survive process restarts; a claimed task holds a lease and is
/// handed out again once the lease expires without completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueTask {
    pub id: Uuid,
    pub lane: Lane,
    pub kind: TaskKind,
    pub export_id: Uuid,
    pub attempts: i64,
    pub max_attempts: i64,
    pub timeout_secs: i64,
    pub status: TaskStatus,
    pub last_error: Option<String>,
    pub available_at: DateTime<Utc>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueueTask {
    /// Whether another retry may be scheduled after a failure
    pub fn retryable(&self) -> bool {
        self.attempts < self.max_attempts
    }
}
