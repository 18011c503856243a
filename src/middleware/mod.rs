//! HTTP middleware

pub mod auth;
pub mod tenant;

pub use auth::{auth_middleware, api_key_middleware, AuthContext, AuthUser, Claims};
pub use tenant::ensure_org_access;
