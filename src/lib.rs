//! Chatlogger backend library
//!
//! Multi-tenant chat logging service with an asynchronous, queue-backed
//! export pipeline. The HTTP API and the export worker are separate
//! binaries sharing this crate; they coordinate only through the job
//! store and the durable task queue.

pub mod api;
pub mod config;
pub mod db;
pub mod jobs;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

pub use config::AppConfig;
pub use db::DbPool;
pub use middleware::{auth_middleware, AuthContext, Claims};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Database connection pool
    pub db: DbPool,
}

/// Initialize tracing according to the logging configuration
///
/// The `RUST_LOG` environment variable overrides the configured level.
pub fn init_logging(config: &AppConfig) {
    use crate::config::LogFormat;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format {
        LogFormat::Json => registry.with(fmt::layer().json().with_target(true)).init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_target(false))
            .init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).init(),
    }
}
