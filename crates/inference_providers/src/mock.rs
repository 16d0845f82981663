//! Mock implementation of InferenceProvider for testing
//!
//! Produces realistic OpenAI-style streams (word-by-word text, reasoning,
//! fragmented tool call arguments) without a network dependency.

use crate::{
    ChatChoice, ChatCompletionChunk, ChatCompletionParams, ChatCompletionResponse,
    ChatCompletionResponseChoice, ChatDelta, ChatResponseMessage, CompletionError, FinishReason,
    FunctionCallDelta, InferenceProvider, MessageRole, SSEEvent, StreamingResult, TokenUsage,
    ToolCall, ToolCallDelta,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Request matcher for conditional responses
#[derive(Clone, Debug)]
pub enum RequestMatcher {
    /// Match any request
    Any,
    /// Match requests whose message texts, joined by spaces, equal the prompt
    ExactPrompt(String),
    /// Match requests whose last user message contains the text
    LastUserMessageContains(String),
    /// Match requests for a specific model
    Model(String),
}

impl RequestMatcher {
    /// Check if this matcher matches the given parameters
    pub fn matches(&self, params: &ChatCompletionParams) -> bool {
        match self {
            Self::Any => true,
            Self::ExactPrompt(prompt) => {
                let all_text = params
                    .messages
                    .iter()
                    .filter_map(|msg| msg.content.as_deref())
                    .collect::<Vec<_>>()
                    .join(" ");
                all_text == *prompt
            }
            Self::LastUserMessageContains(needle) => params
                .messages
                .iter()
                .rev()
                .find(|msg| msg.role == MessageRole::User)
                .and_then(|msg| msg.content.as_deref())
                .is_some_and(|content| content.contains(needle.as_str())),
            Self::Model(model) => params.model == *model,
        }
    }
}

/// A tool call the mock model will issue
#[derive(Clone, Debug)]
pub struct MockToolCall {
    pub id: Option<String>,
    pub name: String,
    pub arguments: String,
}

/// Template for generating responses
#[derive(Clone, Debug)]
pub struct ResponseTemplate {
    content: String,
    reasoning_content: Option<String>,
    tool_calls: Vec<MockToolCall>,
    /// Stream ends after N chunks without a finish chunk
    disconnect_after_chunks: Option<usize>,
    /// Stream yields an error after N chunks
    error_after_chunks: Option<usize>,
    /// Request fails before any chunk is produced
    request_error: Option<CompletionError>,
}

impl ResponseTemplate {
    /// Create a new response template with the given content
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            reasoning_content: None,
            tool_calls: Vec::new(),
            disconnect_after_chunks: None,
            error_after_chunks: None,
            request_error: None,
        }
    }

    /// Set reasoning content for this template
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning_content = Some(reasoning.into());
        self
    }

    /// Add a tool call; its arguments are streamed in several fragments
    pub fn with_tool_call(mut self, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        self.tool_calls.push(MockToolCall {
            id: None,
            name: name.into(),
            arguments: arguments.into(),
        });
        self
    }

    /// Add a tool call with a fixed id
    pub fn with_tool_call_id(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        self.tool_calls.push(MockToolCall {
            id: Some(id.into()),
            name: name.into(),
            arguments: arguments.into(),
        });
        self
    }

    /// Simulate a dropped connection after N chunks
    pub fn with_disconnect_after(mut self, chunks: usize) -> Self {
        self.disconnect_after_chunks = Some(chunks);
        self
    }

    /// Yield a stream error after N chunks
    pub fn with_error_after(mut self, chunks: usize) -> Self {
        self.error_after_chunks = Some(chunks);
        self
    }

    /// Fail the request itself
    pub fn failing(error: CompletionError) -> Self {
        let mut template = Self::new("");
        template.request_error = Some(error);
        template
    }

    fn chunk(id: &str, created: i64, model: &str, delta: ChatDelta) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: id.to_string(),
            object: "chat.completion.chunk".to_string(),
            created,
            model: model.to_string(),
            choices: vec![ChatChoice {
                index: 0,
                delta: Some(delta),
                finish_reason: None,
            }],
            usage: None,
        }
    }

    /// Split on spaces keeping the space attached to the following word
    fn words(text: &str) -> Vec<String> {
        text.split(' ')
            .enumerate()
            .map(|(i, word)| {
                if i == 0 {
                    word.to_string()
                } else {
                    format!(" {word}")
                }
            })
            .filter(|word| !word.is_empty())
            .collect()
    }

    /// Generate streaming chunks from this template
    fn generate_chunks(&self, id: &str, created: i64, model: &str) -> Vec<ChatCompletionChunk> {
        let mut chunks = Vec::new();
        let mut output_tokens = 0;

        if let Some(reasoning) = &self.reasoning_content {
            for word in Self::words(reasoning) {
                output_tokens += 1;
                chunks.push(Self::chunk(
                    id,
                    created,
                    model,
                    ChatDelta {
                        reasoning_content: Some(word),
                        ..Default::default()
                    },
                ));
            }
        }

        for word in Self::words(&self.content) {
            output_tokens += 1;
            chunks.push(Self::chunk(
                id,
                created,
                model,
                ChatDelta {
                    content: Some(word),
                    ..Default::default()
                },
            ));
        }

        for (index, call) in self.tool_calls.iter().enumerate() {
            let call_id = call
                .id
                .clone()
                .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
            chunks.push(Self::chunk(
                id,
                created,
                model,
                ChatDelta {
                    tool_calls: Some(vec![ToolCallDelta {
                        id: Some(call_id),
                        type_: Some("function".to_string()),
                        index: Some(index as i64),
                        function: Some(FunctionCallDelta {
                            name: Some(call.name.clone()),
                            arguments: Some(String::new()),
                        }),
                    }]),
                    ..Default::default()
                },
            ));

            let chars: Vec<char> = call.arguments.chars().collect();
            let fragment_len = chars.len().div_ceil(3).max(1);
            for fragment in chars.chunks(fragment_len) {
                output_tokens += 1;
                chunks.push(Self::chunk(
                    id,
                    created,
                    model,
                    ChatDelta {
                        tool_calls: Some(vec![ToolCallDelta {
                            id: None,
                            type_: None,
                            index: Some(index as i64),
                            function: Some(FunctionCallDelta {
                                name: None,
                                arguments: Some(fragment.iter().collect()),
                            }),
                        }]),
                        ..Default::default()
                    },
                ));
            }
        }

        let finish_reason = if self.tool_calls.is_empty() {
            FinishReason::Stop
        } else {
            FinishReason::ToolCalls
        };
        chunks.push(ChatCompletionChunk {
            id: id.to_string(),
            object: "chat.completion.chunk".to_string(),
            created,
            model: model.to_string(),
            choices: vec![ChatChoice {
                index: 0,
                delta: Some(ChatDelta::default()),
                finish_reason: Some(finish_reason),
            }],
            usage: Some(TokenUsage::new(10, output_tokens)),
        });

        chunks
    }

    fn generate_response(&self, id: String, created: i64, model: String) -> ChatCompletionResponse {
        let tool_calls = (!self.tool_calls.is_empty()).then(|| {
            self.tool_calls
                .iter()
                .map(|call| {
                    ToolCall::function(
                        call.id.clone().unwrap_or_else(|| {
                            format!("call_{}", uuid::Uuid::new_v4().simple())
                        }),
                        call.name.clone(),
                        call.arguments.clone(),
                    )
                })
                .collect()
        });

        ChatCompletionResponse {
            id,
            object: "chat.completion".to_string(),
            created,
            model,
            choices: vec![ChatCompletionResponseChoice {
                index: 0,
                message: ChatResponseMessage {
                    role: MessageRole::Assistant,
                    content: Some(self.content.clone()),
                    tool_calls,
                    reasoning_content: self.reasoning_content.clone(),
                },
                finish_reason: Some("stop".to_string()),
            }],
            usage: Some(TokenUsage::new(
                10,
                self.content.split_whitespace().count() as i32,
            )),
        }
    }
}

/// Configuration for a single expectation
struct MockExpectation {
    matcher: RequestMatcher,
    response: ResponseTemplate,
}

struct MockConfig {
    /// Responses consumed in order before expectations are consulted
    queue: VecDeque<ResponseTemplate>,
    expectations: Vec<MockExpectation>,
    default_response: ResponseTemplate,
}

/// Builder for configuring a single expectation
pub struct MockExpectationBuilder {
    config: Arc<Mutex<MockConfig>>,
    matcher: RequestMatcher,
}

impl MockExpectationBuilder {
    /// Set the response for this expectation
    pub async fn respond_with(self, response: ResponseTemplate) {
        let mut config = self.config.lock().await;
        config.expectations.push(MockExpectation {
            matcher: self.matcher,
            response,
        });
    }
}

/// Mock provider that implements InferenceProvider for testing
#[derive(Clone)]
pub struct MockProvider {
    config: Arc<Mutex<MockConfig>>,
    requests: Arc<Mutex<Vec<ChatCompletionParams>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            config: Arc::new(Mutex::new(MockConfig {
                queue: VecDeque::new(),
                expectations: Vec::new(),
                default_response: ResponseTemplate::new("1. 2. 3."),
            })),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add a conditional response for a specific matcher
    pub fn when(&self, matcher: RequestMatcher) -> MockExpectationBuilder {
        MockExpectationBuilder {
            config: self.config.clone(),
            matcher,
        }
    }

    /// Queue a one-shot response; queued responses win over expectations
    pub async fn enqueue(&self, response: ResponseTemplate) {
        self.config.lock().await.queue.push_back(response);
    }

    /// Set the default response for requests that don't match any expectation
    pub async fn set_default_response(&self, response: ResponseTemplate) {
        self.config.lock().await.default_response = response;
    }

    /// Every request this provider has received, oldest first
    pub async fn recorded_requests(&self) -> Vec<ChatCompletionParams> {
        self.requests.lock().await.clone()
    }

    async fn select_response(&self, params: &ChatCompletionParams) -> ResponseTemplate {
        self.requests.lock().await.push(params.clone());

        let mut config = self.config.lock().await;
        if let Some(queued) = config.queue.pop_front() {
            return queued;
        }
        config
            .expectations
            .iter()
            .find(|expectation| expectation.matcher.matches(params))
            .map(|expectation| expectation.response.clone())
            .unwrap_or_else(|| config.default_response.clone())
    }

    fn generate_chat_id() -> String {
        format!("chatcmpl-{}", uuid::Uuid::new_v4().simple())
    }

    fn current_timestamp() -> i64 {
        chrono::Utc::now().timestamp()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InferenceProvider for MockProvider {
    async fn chat_completion_stream(
        &self,
        params: ChatCompletionParams,
    ) -> Result<StreamingResult, CompletionError> {
        let template = self.select_response(&params).await;
        if let Some(error) = template.request_error.clone() {
            return Err(error);
        }

        let chunks = template.generate_chunks(
            &Self::generate_chat_id(),
            Self::current_timestamp(),
            &params.model,
        );
        let limit = template
            .disconnect_after_chunks
            .or(template.error_after_chunks)
            .unwrap_or(chunks.len());

        let mut events: Vec<Result<SSEEvent, CompletionError>> = chunks
            .into_iter()
            .take(limit)
            .map(|chunk| {
                let json = serde_json::to_string(&chunk)
                    .map_err(|e| CompletionError::Unknown(e.to_string()))?;
                Ok(SSEEvent {
                    raw_bytes: Bytes::from(format!("data: {json}\n\n")),
                    chunk,
                })
            })
            .collect();

        if template.error_after_chunks.is_some() {
            events.push(Err(CompletionError::CompletionError(
                "upstream connection reset".to_string(),
            )));
        }

        Ok(Box::pin(stream::iter(events)))
    }

    async fn chat_completion(
        &self,
        params: ChatCompletionParams,
    ) -> Result<ChatCompletionResponse, CompletionError> {
        let template = self.select_response(&params).await;
        if let Some(error) = template.request_error.clone() {
            return Err(error);
        }
        Ok(template.generate_response(
            Self::generate_chat_id(),
            Self::current_timestamp(),
            params.model,
        ))
    }
}
