//! Business logic services

pub mod auth;
pub mod export;
pub mod exporters;

pub use auth::AuthService;
pub use export::ExportService;
pub use exporters::{ExportBatch, ExportCodec};
