//! API key model
//!
//! Machine credentials scoped to a single organization. Only a one-way
//! digest of the secret is stored; the raw key is returned exactly once,
//! at creation time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: Uuid,
    pub organization_id: Uuid,
    /// SHA-256 hex digest of the raw secret; never serialized
    #[serde(skip_serializing)]
    pub key_digest: String,
    pub label: String,
    pub created_at: DateTime<Utc>,
    /// Set when the key is revoked. The row is kept for audit, but a
    /// revoked key must never validate again.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    pub fn new(organization_id: Uuid, key_digest: String, label: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id,
            key_digest,
            label,
            created_at: Utc::now(),
            revoked_at: None,
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

/// Request to create a new API key
#[derive(Debug, Clone, Deserialize)]
pub struct CreateApiKeyRequest {
    pub label: String,
}

/// Response carrying the plaintext key (only returned on creation)
#[derive(Debug, Clone, Serialize)]
pub struct CreateApiKeyResponse {
    #[serde(flatten)]
    pub api_key: ApiKey,
    pub key: String,
}
