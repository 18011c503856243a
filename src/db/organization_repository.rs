//! Organization repository

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::parse_db_timestamp;
use crate::models::Organization;

#[derive(Debug, sqlx::FromRow)]
struct OrganizationRow {
    id: String,
    name: String,
    slug: String,
    settings: String,
    created_at: String,
    updated_at: String,
}

const ORGANIZATION_COLUMNS: &str = "id, name, slug, settings, created_at, updated_at";

pub struct OrganizationRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> OrganizationRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, org: &Organization) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO organizations (id, name, slug, settings, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(org.id.to_string())
        .bind(&org.name)
        .bind(&org.slug)
        .bind(org.settings.to_string())
        .bind(org.created_at.to_rfc3339())
        .bind(org.updated_at.to_rfc3339())
        .execute(self.pool)
        .await
        .context("Failed to create organization")?;

        Ok(())
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Organization>> {
        let row = sqlx::query_as::<_, OrganizationRow>(&format!(
            "SELECT {} FROM organizations WHERE slug = ?",
            ORGANIZATION_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await
        .context("Failed to get organization by slug")?;

        row.map(row_to_organization).transpose()
    }
}

fn row_to_organization(row: OrganizationRow) -> Result<Organization> {
    Ok(Organization {
        id: Uuid::parse_str(&row.id).context("Invalid organization id")?,
        name: row.name,
        slug: row.slug,
        settings: serde_json::from_str(&row.settings).unwrap_or_default(),
        created_at: parse_db_timestamp(&row.created_at),
        updated_at: parse_db_timestamp(&row.updated_at),
    })
}
