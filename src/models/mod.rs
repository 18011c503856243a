//! Data models

mod api_key;
mod chat;
mod export;
mod message;
mod organization;
mod task;
mod user;

pub use api_key::*;
pub use chat::*;
pub use export::*;
pub use message::*;
pub use organization::*;
pub use task::*;
pub use user::*;
