//! Database layer
//!
//! SQLite-backed storage for:
//! - Organizations, users and API keys
//! - Chats and messages
//! - Export jobs and the durable task queue

pub mod api_key_repository;
pub mod chat_repository;
pub mod export_repository;
pub mod message_repository;
pub mod organization_repository;
pub mod queue_repository;
pub mod user_repository;

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite};

/// Database connection pool type
pub type DbPool = Pool<Sqlite>;

/// Initialize the database connection pool and run pending migrations
pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<DbPool> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Parse a timestamp as stored in SQLite TEXT columns
///
/// New rows are written as RFC 3339; rows inserted by ad-hoc SQL may use
/// the bare `datetime()` format instead.
pub(crate) fn parse_db_timestamp(ts: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S") {
        return DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc);
    }
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rfc3339_timestamp() {
        let dt = parse_db_timestamp("2026-01-15T10:30:00+00:00");
        assert_eq!(dt.to_rfc3339(), "2026-01-15T10:30:00+00:00");
    }

    #[test]
    fn test_parse_sqlite_datetime_format() {
        let dt = parse_db_timestamp("2026-01-15 10:30:00");
        assert_eq!(dt.to_rfc3339(), "2026-01-15T10:30:00+00:00");
    }
}
