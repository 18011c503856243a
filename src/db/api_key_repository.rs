//! API key repository
//!
//! Only the SHA-256 digest of an API key is stored; the raw key is shown
//! to the caller exactly once at creation time.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::parse_db_timestamp;
use crate::models::ApiKey;

#[derive(Debug, sqlx::FromRow)]
struct ApiKeyRow {
    id: String,
    organization_id: String,
    key_digest: String,
    label: String,
    created_at: String,
    revoked_at: Option<String>,
}

const API_KEY_COLUMNS: &str = "id, organization_id, key_digest, label, created_at, revoked_at";

pub struct ApiKeyRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ApiKeyRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, key: &ApiKey) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO api_keys (id, organization_id, key_digest, label, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(key.id.to_string())
        .bind(key.organization_id.to_string())
        .bind(&key.key_digest)
        .bind(&key.label)
        .bind(key.created_at.to_rfc3339())
        .execute(self.pool)
        .await
        .context("Failed to create api key")?;

        Ok(())
    }

    /// Look up a key by the digest of its raw value
    ///
    /// Revoked keys are still returned; the caller decides how to reject
    /// them so that revoked and unknown keys are indistinguishable on the
    /// wire.
    pub async fn get_by_digest(&self, digest: &str) -> Result<Option<ApiKey>> {
        let row = sqlx::query_as::<_, ApiKeyRow>(&format!(
            "SELECT {} FROM api_keys WHERE key_digest = ?",
            API_KEY_COLUMNS
        ))
        .bind(digest)
        .fetch_optional(self.pool)
        .await
        .context("Failed to get api key by digest")?;

        row.map(row_to_api_key).transpose()
    }

    pub async fn list_for_organization(&self, organization_id: Uuid) -> Result<Vec<ApiKey>> {
        let rows = sqlx::query_as::<_, ApiKeyRow>(&format!(
            "SELECT {} FROM api_keys WHERE organization_id = ? ORDER BY created_at DESC",
            API_KEY_COLUMNS
        ))
        .bind(organization_id.to_string())
        .fetch_all(self.pool)
        .await
        .context("Failed to list api keys")?;

        rows.into_iter().map(row_to_api_key).collect()
    }

    /// Revoke a key within its owning organization
    ///
    /// Revocation is a tombstone, not a delete; the digest stays unique so
    /// a revoked key can never be re-registered.
    pub async fn revoke(&self, organization_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE api_keys SET revoked_at = ?
            WHERE organization_id = ? AND id = ? AND revoked_at IS NULL
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(organization_id.to_string())
        .bind(id.to_string())
        .execute(self.pool)
        .await
        .context("Failed to revoke api key")?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_to_api_key(row: ApiKeyRow) -> Result<ApiKey> {
    Ok(ApiKey {
        id: Uuid::parse_str(&row.id).context("Invalid api key id")?,
        organization_id: Uuid::parse_str(&row.organization_id)
            .context("Invalid organization id")?,
        key_digest: row.key_digest,
        label: row.label,
        created_at: parse_db_timestamp(&row.created_at),
        revoked_at: row.revoked_at.as_deref().map(parse_db_timestamp),
    })
}
