//! Chat (conversation session) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Message;

/// A conversation session. `user_id` is optional to allow anonymous chats
/// recorded through the organization API key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: Uuid,
    pub organization_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    pub title: String,
    /// JSON array of tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Opaque session metadata (ip address, language, sentiment, ...)
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Populated only when messages are explicitly loaded (e.g. exports)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
}

impl Chat {
    pub fn new(organization_id: Uuid, user_id: Option<Uuid>, title: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            organization_id,
            user_id,
            title,
            tags: Vec::new(),
            metadata: serde_json::json!({}),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
        }
    }
}

/// Request to record a new chat
#[derive(Debug, Clone, Deserialize)]
pub struct CreateChatRequest {
    pub title: String,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}
