//! Web search tool. Results go back to the model and are announced to the
//! client as sources.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::executor::{parse_input, ToolExecutionContext, ToolExecutor, ToolOutput};
use super::ports::{WebSearchParams, WebSearchProviderTrait};
use crate::chat::errors::ToolError;

pub const WEB_SEARCH_TOOL_NAME: &str = "webSearcher";

const DEFAULT_RESULT_COUNT: u32 = 5;

#[derive(Debug, Deserialize)]
struct WebSearchInput {
    query: String,
    #[serde(default)]
    count: Option<u32>,
}

pub struct WebSearchToolExecutor {
    provider: Arc<dyn WebSearchProviderTrait>,
}

impl WebSearchToolExecutor {
    pub fn new(provider: Arc<dyn WebSearchProviderTrait>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ToolExecutor for WebSearchToolExecutor {
    fn name(&self) -> &str {
        WEB_SEARCH_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Search the web for up-to-date information. Use it for current events, facts you are \
         unsure about, or anything after your knowledge cutoff."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "The search query"},
                "count": {
                    "type": "integer",
                    "description": "Number of results to return (max 20)",
                    "minimum": 1,
                    "maximum": 20
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(
        &self,
        input: &Value,
        context: &ToolExecutionContext<'_>,
    ) -> Result<ToolOutput, ToolError> {
        let input: WebSearchInput = parse_input(self.name(), input)?;
        if input.query.trim().is_empty() {
            return Err(ToolError::invalid_input(self.name(), "query must not be empty"));
        }

        tracing::info!(chat_id = %context.chat_id, query = %input.query, "Executing web search");

        let mut params = WebSearchParams::new(input.query);
        params.count = Some(input.count.unwrap_or(DEFAULT_RESULT_COUNT));

        let results = self
            .provider
            .search(params)
            .await
            .map_err(|e| ToolError::execution(WEB_SEARCH_TOOL_NAME, e))?;

        Ok(ToolOutput::WebSearch { results })
    }
}
