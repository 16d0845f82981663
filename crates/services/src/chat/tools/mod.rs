//! Tools the model can call during a chat turn.
//!
//! Each tool talks to its third-party service through a provider port so
//! tests can swap in mocks.

pub mod app_builder;
pub mod brave;
pub mod email;
pub mod executor;
pub mod gemini;
pub mod image_generator;
pub mod ports;
pub mod resend;
pub mod v0;
pub mod web_search;

pub use app_builder::{AppBuilderToolExecutor, APP_BUILDER_TOOL_NAME};
pub use brave::BraveWebSearchProvider;
pub use email::{EmailToolExecutor, EMAIL_TOOL_NAME};
pub use executor::{
    ToolCallOutcome, ToolExecutionContext, ToolExecutor, ToolOutput, ToolRegistry,
    MAX_CONSECUTIVE_TOOL_FAILURES,
};
pub use gemini::GeminiImageProvider;
pub use image_generator::{ImageGeneratorToolExecutor, IMAGE_TOOL_NAME};
pub use ports::*;
pub use resend::ResendEmailProvider;
pub use v0::V0AppBuilderProvider;
pub use web_search::{WebSearchToolExecutor, WEB_SEARCH_TOOL_NAME};
