use crate::common::RepositoryError;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Chat not found: {0}")]
    NotFound(String),
    #[error("Model error: {0}")]
    ModelError(String),
    #[error("Persistence error: {0}")]
    Persistence(#[from] RepositoryError),
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Failure of a single tool call. These never abort a stream; they are
/// turned into a failed tool result that the model gets to see.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolError {
    #[error("Tool name is empty")]
    EmptyToolName,
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid input for {tool}: {message}")]
    InvalidInput { tool: String, message: String },
    #[error("{tool} failed: {message}")]
    ExecutionFailed { tool: String, message: String },
    #[error("{tool} timed out after {seconds}s")]
    Timeout { tool: String, seconds: u64 },
}

impl ToolError {
    pub fn invalid_input(tool: &str, error: impl std::fmt::Display) -> Self {
        ToolError::InvalidInput {
            tool: tool.to_string(),
            message: error.to_string(),
        }
    }

    pub fn execution(tool: &str, error: impl std::fmt::Display) -> Self {
        ToolError::ExecutionFailed {
            tool: tool.to_string(),
            message: error.to_string(),
        }
    }
}

/// Title generation failures are logged and dropped; the chat keeps its old title
#[derive(Debug, thiserror::Error)]
pub enum TitleError {
    #[error("Title model error: {0}")]
    Model(String),
    #[error("Title model returned no usable text")]
    Empty,
    #[error("Failed to store title: {0}")]
    Persistence(#[from] RepositoryError),
}
