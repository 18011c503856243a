//! User repository

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::parse_db_timestamp;
use crate::models::{Role, User};

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    organization_id: String,
    email: String,
    password_hash: String,
    role: String,
    first_name: Option<String>,
    last_name: Option<String>,
    last_login_at: Option<String>,
    created_at: String,
    updated_at: String,
}

const USER_COLUMNS: &str = "id, organization_id, email, password_hash, role, first_name, \
                            last_name, last_login_at, created_at, updated_at";

pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, organization_id, email, password_hash, role,
                               first_name, last_name, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id.to_string())
        .bind(user.organization_id.to_string())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.created_at.to_rfc3339())
        .bind(user.updated_at.to_rfc3339())
        .execute(self.pool)
        .await
        .context("Failed to create user")?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = ?",
            USER_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await
        .context("Failed to get user")?;

        row.map(row_to_user).transpose()
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE email = ?",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(self.pool)
        .await
        .context("Failed to get user by email")?;

        row.map(row_to_user).transpose()
    }

    pub async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<()> {
        sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(self.pool)
            .await
            .context("Failed to update password")?;

        Ok(())
    }

    pub async fn update_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE users SET last_login_at = ?, updated_at = ? WHERE id = ?")
            .bind(at.to_rfc3339())
            .bind(at.to_rfc3339())
            .bind(id.to_string())
            .execute(self.pool)
            .await
            .context("Failed to update last login timestamp")?;

        Ok(())
    }
}

fn row_to_user(row: UserRow) -> Result<User> {
    let role = row
        .role
        .parse::<Role>()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Invalid user role")?;

    Ok(User {
        id: Uuid::parse_str(&row.id).context("Invalid user id")?,
        organization_id: Uuid::parse_str(&row.organization_id)
            .context("Invalid organization id")?,
        email: row.email,
        password_hash: row.password_hash,
        role,
        first_name: row.first_name,
        last_name: row.last_name,
        last_login_at: row.last_login_at.as_deref().map(parse_db_timestamp),
        created_at: parse_db_timestamp(&row.created_at),
        updated_at: parse_db_timestamp(&row.updated_at),
    })
}
