//! Message repository

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::parse_db_timestamp;
use crate::models::{Message, MessageRole};

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: String,
    chat_id: String,
    role: String,
    content: String,
    metadata: String,
    token_count: i64,
    latency_ms: i64,
    created_at: String,
}

const MESSAGE_COLUMNS: &str =
    "id, chat_id, role, content, metadata, token_count, latency_ms, created_at";

pub struct MessageRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MessageRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, message: &Message) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, chat_id, role, content, metadata,
                                  token_count, latency_ms, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(message.id.to_string())
        .bind(message.chat_id.to_string())
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.metadata.to_string())
        .bind(message.token_count)
        .bind(message.latency_ms)
        .bind(message.created_at.to_rfc3339())
        .execute(self.pool)
        .await
        .context("Failed to create message")?;

        Ok(())
    }

    /// Messages of a chat in conversation order
    pub async fn list_for_chat(&self, chat_id: Uuid) -> Result<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {} FROM messages WHERE chat_id = ? ORDER BY created_at ASC",
            MESSAGE_COLUMNS
        ))
        .bind(chat_id.to_string())
        .fetch_all(self.pool)
        .await
        .context("Failed to list messages")?;

        rows.into_iter().map(row_to_message).collect()
    }
}

fn row_to_message(row: MessageRow) -> Result<Message> {
    let role = row
        .role
        .parse::<MessageRole>()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Invalid message role")?;

    Ok(Message {
        id: Uuid::parse_str(&row.id).context("Invalid message id")?,
        chat_id: Uuid::parse_str(&row.chat_id).context("Invalid chat id")?,
        role,
        content: row.content,
        metadata: serde_json::from_str(&row.metadata).unwrap_or_default(),
        token_count: row.token_count,
        latency_ms: row.latency_ms,
        created_at: parse_db_timestamp(&row.created_at),
    })
}
