pub mod auth;
pub mod chat;
pub mod common;
pub mod files;
pub mod id_prefixes;
pub mod memory;
pub mod projects;

pub use auth::UserId;
pub use chat::ChatServiceImpl;
