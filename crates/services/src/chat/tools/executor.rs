//! Tool Executor Framework
//!
//! Every tool the model may call implements [`ToolExecutor`]. The
//! [`ToolRegistry`] dispatches calls by name, enforces the per-call timeout
//! and turns every failure into a result the model can read.

use async_trait::async_trait;
use inference_providers::ToolDefinition;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use super::ports::WebSearchResult;
use crate::auth::AuthenticatedUser;
use crate::chat::errors::ToolError;
use crate::chat::models::ChatId;
use crate::chat::service_helpers::ToolCallInfo;

/// Output from tool execution
///
/// The service layer pattern-matches on this to emit the extra stream
/// events a tool produces (sources for searches, files for images).
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// Arbitrary JSON result
    Json(Value),

    /// Web search results, also announced as sources
    WebSearch { results: Vec<WebSearchResult> },

    /// A stored image, also announced as a file part
    Image { url: String, media_type: String },
}

impl ToolOutput {
    /// JSON form recorded on the tool invocation and sent back to the model
    pub fn to_value(&self) -> Value {
        match self {
            ToolOutput::Json(value) => value.clone(),
            ToolOutput::WebSearch { results } => json!(results),
            ToolOutput::Image { url, .. } => json!({ "url": url }),
        }
    }
}

/// Read-only data about the turn a tool runs in
pub struct ToolExecutionContext<'a> {
    pub chat_id: &'a ChatId,
    pub user: &'a AuthenticatedUser,
}

/// Deserialize the arguments of a call into the tool's input type
pub fn parse_input<T: DeserializeOwned>(tool: &str, input: &Value) -> Result<T, ToolError> {
    serde_json::from_value(input.clone()).map_err(|e| ToolError::invalid_input(tool, e))
}

#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Name the model uses to call this tool
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the input object
    fn input_schema(&self) -> Value;

    fn can_handle(&self, tool_name: &str) -> bool {
        tool_name == self.name()
    }

    /// Whether an assistant message with this call pending is unfinished
    /// and must not be persisted yet
    fn blocks_turn_completion(&self) -> bool {
        false
    }

    async fn execute(
        &self,
        input: &Value,
        context: &ToolExecutionContext<'_>,
    ) -> Result<ToolOutput, ToolError>;

    /// Result recorded when execution fails. Override to give the model a
    /// tool-specific error shape.
    fn handle_error(&self, error: &ToolError) -> Value {
        json!({ "error": error.to_string() })
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(self.name(), self.description(), self.input_schema())
    }
}

/// What a finished call produced. `result` is set only on success.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallOutcome {
    pub output: Value,
    pub result: Option<ToolOutput>,
    pub is_error: bool,
}

/// Maximum consecutive failures before logging error instead of warning
pub const MAX_CONSECUTIVE_TOOL_FAILURES: u32 = 3;

pub struct ToolRegistry {
    executors: Vec<Arc<dyn ToolExecutor>>,
    timeout: Duration,
    /// Consecutive failures per tool for retry-aware logging
    failure_counts: RwLock<HashMap<String, u32>>,
}

impl ToolRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            executors: Vec::new(),
            timeout,
            failure_counts: RwLock::new(HashMap::new()),
        }
    }

    fn reset_failure_count(&self, tool_name: &str) {
        if let Ok(mut counts) = self.failure_counts.write() {
            counts.remove(tool_name);
        }
    }

    fn increment_failure_count(&self, tool_name: &str) -> u32 {
        if let Ok(mut counts) = self.failure_counts.write() {
            let count = counts.entry(tool_name.to_string()).or_insert(0);
            *count += 1;
            *count
        } else {
            1
        }
    }

    fn log_tool_error(&self, tool_name: &str, failure_count: u32, error: &ToolError) {
        if failure_count > MAX_CONSECUTIVE_TOOL_FAILURES {
            tracing::error!(
                tool = %tool_name,
                failures = %failure_count,
                error = %error,
                "Tool failed after {} attempts. Error fed back to the model.",
                MAX_CONSECUTIVE_TOOL_FAILURES,
            );
        } else {
            tracing::warn!(
                tool = %tool_name,
                attempt = %failure_count,
                error = %error,
                "Tool failed, feeding error back to the model",
            );
        }
    }

    pub fn register(&mut self, executor: Arc<dyn ToolExecutor>) {
        self.executors.push(executor);
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }

    pub fn can_handle(&self, tool_name: &str) -> bool {
        self.executors.iter().any(|e| e.can_handle(tool_name))
    }

    /// Tool definitions offered to the model, in registration order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.executors.iter().map(|e| e.definition()).collect()
    }

    /// Names of the registered tools that gate persistence by default
    pub fn blocking_tools(&self) -> Vec<String> {
        self.executors
            .iter()
            .filter(|e| e.blocks_turn_completion())
            .map(|e| e.name().to_string())
            .collect()
    }

    fn find(&self, tool_name: &str) -> Option<&Arc<dyn ToolExecutor>> {
        self.executors.iter().find(|e| e.can_handle(tool_name))
    }

    /// Execute a call, bounded by the registry timeout
    pub async fn execute(
        &self,
        tool_call: &ToolCallInfo,
        context: &ToolExecutionContext<'_>,
    ) -> Result<ToolOutput, ToolError> {
        if tool_call.name.trim().is_empty() {
            return Err(ToolError::EmptyToolName);
        }
        let executor = self
            .find(&tool_call.name)
            .ok_or_else(|| ToolError::UnknownTool(tool_call.name.clone()))?;
        let input = tool_call.input()?;

        match tokio::time::timeout(self.timeout, executor.execute(&input, context)).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout {
                tool: tool_call.name.clone(),
                seconds: self.timeout.as_secs(),
            }),
        }
    }

    /// Execute a call and always produce an outcome. Failures become an
    /// error result for the model instead of aborting the stream.
    pub async fn run(
        &self,
        tool_call: &ToolCallInfo,
        context: &ToolExecutionContext<'_>,
    ) -> ToolCallOutcome {
        match self.execute(tool_call, context).await {
            Ok(result) => {
                self.reset_failure_count(&tool_call.name);
                tracing::debug!(tool = %tool_call.name, tool_call_id = %tool_call.id, "Tool call succeeded");
                ToolCallOutcome {
                    output: result.to_value(),
                    result: Some(result),
                    is_error: false,
                }
            }
            Err(error) => {
                let failure_count = self.increment_failure_count(&tool_call.name);
                self.log_tool_error(&tool_call.name, failure_count, &error);
                let output = match self.find(&tool_call.name) {
                    Some(executor) => executor.handle_error(&error),
                    None => json!({ "error": error.to_string() }),
                };
                ToolCallOutcome {
                    output,
                    result: None,
                    is_error: true,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UserId;

    struct EchoTool {
        delay: Option<Duration>,
    }

    #[async_trait]
    impl ToolExecutor for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes its input"
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }

        async fn execute(
            &self,
            input: &Value,
            _context: &ToolExecutionContext<'_>,
        ) -> Result<ToolOutput, ToolError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match input.get("text").and_then(Value::as_str) {
                Some(text) => Ok(ToolOutput::Json(json!({ "echo": text }))),
                None => Err(ToolError::invalid_input("echo", "missing text")),
            }
        }
    }

    fn user() -> AuthenticatedUser {
        AuthenticatedUser {
            id: UserId::from("u1"),
            name: "Ada".to_string(),
            email: None,
        }
    }

    fn registry(delay: Option<Duration>) -> ToolRegistry {
        let mut registry = ToolRegistry::new(Duration::from_millis(50));
        registry.register(Arc::new(EchoTool { delay }));
        registry
    }

    fn call(name: &str, arguments: &str) -> ToolCallInfo {
        ToolCallInfo::new("call_1", name, arguments)
    }

    #[tokio::test]
    async fn test_execute_success() {
        let registry = registry(None);
        let chat_id = ChatId::from("c1");
        let user = user();
        let context = ToolExecutionContext {
            chat_id: &chat_id,
            user: &user,
        };

        let outcome = registry.run(&call("echo", r#"{"text":"hi"}"#), &context).await;
        assert!(!outcome.is_error);
        assert_eq!(outcome.output, json!({"echo": "hi"}));
    }

    #[tokio::test]
    async fn test_unknown_and_empty_tool_names() {
        let registry = registry(None);
        let chat_id = ChatId::from("c1");
        let user = user();
        let context = ToolExecutionContext {
            chat_id: &chat_id,
            user: &user,
        };

        let result = registry.execute(&call("nope", "{}"), &context).await;
        assert!(matches!(result, Err(ToolError::UnknownTool(_))));

        let result = registry.execute(&call("  ", "{}"), &context).await;
        assert!(matches!(result, Err(ToolError::EmptyToolName)));

        let outcome = registry.run(&call("nope", "{}"), &context).await;
        assert!(outcome.is_error);
        assert_eq!(outcome.output, json!({"error": "Unknown tool: nope"}));
    }

    #[tokio::test]
    async fn test_invalid_arguments_become_error_output() {
        let registry = registry(None);
        let chat_id = ChatId::from("c1");
        let user = user();
        let context = ToolExecutionContext {
            chat_id: &chat_id,
            user: &user,
        };

        let outcome = registry.run(&call("echo", "{not json"), &context).await;
        assert!(outcome.is_error);
        assert!(outcome.result.is_none());
        assert!(outcome.output["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid input for echo"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let registry = registry(Some(Duration::from_secs(5)));
        let chat_id = ChatId::from("c1");
        let user = user();
        let context = ToolExecutionContext {
            chat_id: &chat_id,
            user: &user,
        };

        let result = registry
            .execute(&call("echo", r#"{"text":"hi"}"#), &context)
            .await;
        assert!(matches!(result, Err(ToolError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_failure_count_resets_on_success() {
        let registry = registry(None);
        let chat_id = ChatId::from("c1");
        let user = user();
        let context = ToolExecutionContext {
            chat_id: &chat_id,
            user: &user,
        };

        registry.run(&call("echo", "{}"), &context).await;
        registry.run(&call("echo", "{}"), &context).await;
        assert_eq!(registry.failure_counts.read().unwrap().get("echo"), Some(&2));

        registry.run(&call("echo", r#"{"text":"ok"}"#), &context).await;
        assert!(registry.failure_counts.read().unwrap().get("echo").is_none());
    }

    #[test]
    fn test_definitions() {
        let registry = registry(None);
        let definitions = registry.definitions();
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].function.name, "echo");
        assert!(registry.can_handle("echo"));
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_tool_output_values() {
        let image = ToolOutput::Image {
            url: "https://cdn/x.png".to_string(),
            media_type: "image/png".to_string(),
        };
        assert_eq!(image.to_value(), json!({"url": "https://cdn/x.png"}));

        let search = ToolOutput::WebSearch {
            results: vec![WebSearchResult {
                title: "t".to_string(),
                url: "u".to_string(),
                snippet: "s".to_string(),
            }],
        };
        assert_eq!(
            search.to_value(),
            json!([{"title": "t", "url": "u", "snippet": "s"}])
        );
    }
}
