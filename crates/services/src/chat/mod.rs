//! Chat turns: the stream orchestrator, its tools and the rules for what
//! gets persisted.

pub mod assembly;
pub mod convert;
pub mod errors;
pub mod models;
pub mod ports;
pub mod service;
pub mod service_helpers;
pub mod smoothing;
pub mod title;
pub mod tools;
pub mod turn;

pub use errors::{ChatError, TitleError, ToolError};
pub use models::*;
pub use ports::*;
pub use service::ChatServiceImpl;
pub use title::TitleGenerator;
pub use turn::{select_turn, CompletenessGate};
