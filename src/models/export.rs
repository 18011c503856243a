//! Export job model
//!
//! An export job is the durable record of a bulk export request. It is
//! created `pending` by the API server and advanced exclusively by the
//! export worker: `pending -> processing -> completed | failed`. The
//! transitions are monotonic; a job never returns to `pending`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of an export job
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ExportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportStatus::Pending => "pending",
            ExportStatus::Processing => "processing",
            ExportStatus::Completed => "completed",
            ExportStatus::Failed => "failed",
        }
    }

    /// Terminal statuses permit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExportStatus::Completed | ExportStatus::Failed)
    }
}

impl std::str::FromStr for ExportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ExportStatus::Pending),
            "processing" => Ok(ExportStatus::Processing),
            "completed" => Ok(ExportStatus::Completed),
            "failed" => Ok(ExportStatus::Failed),
            _ => Err(format!("Invalid export status: {}", s)),
        }
    }
}

/// Output format of an export artifact
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Indented structured document with nested chats and messages
    Json,
    /// Flat table, one row per message
    Csv,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(format!("Invalid export format: {}", s)),
        }
    }
}

/// Which data categories an export includes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportScope {
    Chats,
    Messages,
    All,
}

impl ExportScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportScope::Chats => "chats",
            ExportScope::Messages => "messages",
            ExportScope::All => "all",
        }
    }

    /// Whether each chat's messages must be loaded and attached
    pub fn includes_messages(&self) -> bool {
        matches!(self, ExportScope::Messages | ExportScope::All)
    }
}

impl std::str::FromStr for ExportScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chats" => Ok(ExportScope::Chats),
            "messages" => Ok(ExportScope::Messages),
            "all" => Ok(ExportScope::All),
            _ => Err(format!("Invalid export scope: {}", s)),
        }
    }
}

/// Export job entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportJob {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub format: ExportFormat,
    pub scope: ExportScope,
    pub status: ExportStatus,
    /// Artifact path; populated if and only if the job completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// Failure description; populated only when the job failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExportJob {
    pub fn new(
        organization_id: Uuid,
        user_id: Uuid,
        format: ExportFormat,
        scope: ExportScope,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            organization_id,
            user_id,
            format,
            scope,
            status: ExportStatus::Pending,
            file_path: None,
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}

/// Request to create an export job
#[derive(Debug, Clone, Deserialize)]
pub struct CreateExportRequest {
    pub format: ExportFormat,
    #[serde(alias = "type")]
    pub scope: ExportScope,
}

/// Accepted response for a freshly queued export
#[derive(Debug, Clone, Serialize)]
pub struct CreateExportResponse {
    pub export_id: Uuid,
    pub status: ExportStatus,
    pub message: String,
}
