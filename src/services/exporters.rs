//! Export serialization codecs
//!
//! An [`ExportBatch`] is the in-memory snapshot of everything an export
//! contains; an [`ExportCodec`] turns it into artifact bytes. The set of
//! codecs is closed: adding a format means adding a variant here, next to
//! the serialization logic it dispatches to.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Chat, ExportFormat, ExportScope};

/// Snapshot of the data included in one export
#[derive(Debug, Clone, Serialize)]
pub struct ExportBatch {
    pub organization_id: Uuid,
    pub export_date: DateTime<Utc>,
    #[serde(rename = "export_type")]
    pub scope: ExportScope,
    pub chats: Vec<Chat>,
}

/// Serialization codec for export artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportCodec {
    Json,
    Csv,
}

impl From<ExportFormat> for ExportCodec {
    fn from(format: ExportFormat) -> Self {
        match format {
            ExportFormat::Json => ExportCodec::Json,
            ExportFormat::Csv => ExportCodec::Csv,
        }
    }
}

const CSV_HEADER: &str = "Chat ID,Organization ID,User ID,Title,Created At,\
                          Message ID,Role,Content,Timestamp,Token Count,Latency";

impl ExportCodec {
    /// Serialize a batch into artifact bytes
    pub fn serialize(&self, batch: &ExportBatch) -> Result<Vec<u8>> {
        match self {
            ExportCodec::Json => {
                serde_json::to_vec_pretty(batch).context("Failed to serialize export as JSON")
            }
            ExportCodec::Csv => Ok(serialize_csv(batch).into_bytes()),
        }
    }
}

/// Flatten chats into one CSV row per message
///
/// A chat without messages still contributes one row with empty message
/// columns, so every exported chat is visible in the artifact.
fn serialize_csv(batch: &ExportBatch) -> String {
    let mut out = String::new();
    out.push_str(CSV_HEADER);
    out.push('\n');

    for chat in &batch.chats {
        let user_id = chat
            .user_id
            .map(|u| u.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let chat_cols = [
            chat.id.to_string(),
            chat.organization_id.to_string(),
            user_id,
            chat.title.clone(),
            chat.created_at.to_rfc3339(),
        ];

        if chat.messages.is_empty() {
            push_row(&mut out, &chat_cols, &["", "", "", "", "", ""]);
            continue;
        }

        for message in &chat.messages {
            let message_cols = [
                message.id.to_string(),
                message.role.as_str().to_string(),
                message.content.clone(),
                message.created_at.to_rfc3339(),
                message.token_count.to_string(),
                message.latency_ms.to_string(),
            ];
            let refs: Vec<&str> = message_cols.iter().map(String::as_str).collect();
            push_row(&mut out, &chat_cols, &refs);
        }
    }

    out
}

fn push_row(out: &mut String, chat_cols: &[String], message_cols: &[&str]) {
    let mut fields = Vec::with_capacity(chat_cols.len() + message_cols.len());
    fields.extend(chat_cols.iter().map(|c| escape_csv_field(c)));
    fields.extend(message_cols.iter().map(|c| escape_csv_field(c)));
    out.push_str(&fields.join(","));
    out.push('\n');
}

/// Quote a CSV field when it contains a comma, quote or newline
fn escape_csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Message, MessageRole};

    fn batch_with(chats: Vec<Chat>) -> ExportBatch {
        ExportBatch {
            organization_id: Uuid::new_v4(),
            export_date: Utc::now(),
            scope: ExportScope::All,
            chats,
        }
    }

    fn chat_with_messages(count: usize) -> Chat {
        let org = Uuid::new_v4();
        let mut chat = Chat::new(org, None, "Support session".to_string());
        for i in 0..count {
            chat.messages.push(Message::new(
                chat.id,
                MessageRole::User,
                format!("message {}", i),
            ));
        }
        chat
    }

    #[test]
    fn test_json_output_is_valid_and_typed() {
        let batch = batch_with(vec![chat_with_messages(2)]);
        let bytes = ExportCodec::Json.serialize(&batch).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value["export_type"], "all");
        assert_eq!(value["chats"].as_array().unwrap().len(), 1);
        assert_eq!(value["chats"][0]["messages"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_csv_row_per_message_plus_placeholder() {
        // one chat with 3 messages, one with none: header + 3 + 1 rows
        let batch = batch_with(vec![chat_with_messages(3), chat_with_messages(0)]);
        let bytes = ExportCodec::Csv.serialize(&batch).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("Chat ID,Organization ID,User ID,Title"));
        assert!(lines[4].contains("N/A"));
    }

    #[test]
    fn test_csv_escapes_embedded_delimiters() {
        let mut chat = chat_with_messages(0);
        chat.title = "hello, \"world\"".to_string();
        let batch = batch_with(vec![chat]);
        let text = String::from_utf8(ExportCodec::Csv.serialize(&batch).unwrap()).unwrap();

        assert!(text.contains("\"hello, \"\"world\"\"\""));
    }

    #[test]
    fn test_csv_field_with_newline_is_quoted() {
        assert_eq!(escape_csv_field("a\nb"), "\"a\nb\"");
        assert_eq!(escape_csv_field("plain"), "plain");
    }

    #[test]
    fn test_codec_follows_format() {
        assert_eq!(ExportCodec::from(ExportFormat::Json), ExportCodec::Json);
        assert_eq!(ExportCodec::from(ExportFormat::Csv), ExportCodec::Csv);
    }
}
