//! Chat repository
//!
//! Every query is scoped by organization id, so a chat that exists in
//! another tenant behaves exactly like a chat that does not exist.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::parse_db_timestamp;
use crate::models::Chat;

/// Upper bound on chats fetched for a single export
pub const EXPORT_PAGE_LIMIT: i64 = 1000;

#[derive(Debug, sqlx::FromRow)]
struct ChatRow {
    id: String,
    organization_id: String,
    user_id: Option<String>,
    title: String,
    tags: String,
    metadata: String,
    created_at: String,
    updated_at: String,
}

const CHAT_COLUMNS: &str =
    "id, organization_id, user_id, title, tags, metadata, created_at, updated_at";

pub struct ChatRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ChatRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, chat: &Chat) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chats (id, organization_id, user_id, title, tags, metadata,
                               created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(chat.id.to_string())
        .bind(chat.organization_id.to_string())
        .bind(chat.user_id.map(|u| u.to_string()))
        .bind(&chat.title)
        .bind(serde_json::to_string(&chat.tags).unwrap_or_else(|_| "[]".to_string()))
        .bind(chat.metadata.to_string())
        .bind(chat.created_at.to_rfc3339())
        .bind(chat.updated_at.to_rfc3339())
        .execute(self.pool)
        .await
        .context("Failed to create chat")?;

        Ok(())
    }

    pub async fn get_by_id(&self, organization_id: Uuid, id: Uuid) -> Result<Option<Chat>> {
        let row = sqlx::query_as::<_, ChatRow>(&format!(
            "SELECT {} FROM chats WHERE organization_id = ? AND id = ?",
            CHAT_COLUMNS
        ))
        .bind(organization_id.to_string())
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await
        .context("Failed to get chat")?;

        row.map(row_to_chat).transpose()
    }

    /// Fetch the chats included in an export, oldest first
    pub async fn list_for_export(&self, organization_id: Uuid) -> Result<Vec<Chat>> {
        let rows = sqlx::query_as::<_, ChatRow>(&format!(
            "SELECT {} FROM chats WHERE organization_id = ? ORDER BY created_at ASC LIMIT ?",
            CHAT_COLUMNS
        ))
        .bind(organization_id.to_string())
        .bind(EXPORT_PAGE_LIMIT)
        .fetch_all(self.pool)
        .await
        .context("Failed to list chats for export")?;

        rows.into_iter().map(row_to_chat).collect()
    }
}

fn row_to_chat(row: ChatRow) -> Result<Chat> {
    Ok(Chat {
        id: Uuid::parse_str(&row.id).context("Invalid chat id")?,
        organization_id: Uuid::parse_str(&row.organization_id)
            .context("Invalid organization id")?,
        user_id: row
            .user_id
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .context("Invalid user id")?,
        title: row.title,
        tags: serde_json::from_str(&row.tags).unwrap_or_default(),
        metadata: serde_json::from_str(&row.metadata).unwrap_or_default(),
        created_at: parse_db_timestamp(&row.created_at),
        updated_at: parse_db_timestamp(&row.updated_at),
        messages: Vec::new(),
    })
}
