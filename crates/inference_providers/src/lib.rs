//! Inference providers crate for talking to chat model backends
//!
//! This crate provides a streaming-first trait interface for model providers,
//! so the chat orchestrator can switch between a real OpenAI-compatible
//! endpoint and a scripted mock in tests.
//!
//! # Usage
//!
//! ```rust,ignore
//! use inference_providers::{ChatCompletionParams, ChatMessage, InferenceProvider};
//! use futures_util::StreamExt;
//!
//! async fn example<P: InferenceProvider>(provider: P) {
//!     let params = ChatCompletionParams::new("openai/gpt-4o-mini", vec![ChatMessage::user("Hi")]);
//!
//!     let mut stream = provider.chat_completion_stream(params).await?;
//!     while let Some(event) = stream.next().await {
//!         match event {
//!             Ok(event) => {
//!                 if let Some(delta) = event.chunk.choices.first().and_then(|c| c.delta.as_ref()) {
//!                     println!("Delta content: {:?}", delta.content);
//!                 }
//!             }
//!             Err(e) => eprintln!("Stream error: {}", e),
//!         }
//!     }
//! }
//! ```

pub mod external;
pub mod mock;
pub mod models;
pub mod sse_parser;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

pub use external::{OpenAiCompatibleProvider, ProviderConfig};
pub use mock::{MockProvider, RequestMatcher, ResponseTemplate};
pub use models::{
    ChatChoice, ChatCompletionChunk, ChatCompletionParams, ChatCompletionResponse,
    ChatCompletionResponseChoice, ChatDelta, ChatMessage, ChatResponseMessage, CompletionError,
    FinishReason, FunctionCall, FunctionCallDelta, FunctionDefinition, MessageRole,
    StreamOptions, TokenUsage, ToolCall, ToolCallDelta, ToolDefinition,
};
pub use sse_parser::SSEEvent;

/// Stream of parsed SSE events from a streaming chat completion
pub type StreamingResult = Pin<Box<dyn Stream<Item = Result<SSEEvent, CompletionError>> + Send>>;

#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Performs a streaming chat completion request
    ///
    /// The stream emits chunks as they become available from the provider
    /// and ends after the provider's `[DONE]` marker.
    async fn chat_completion_stream(
        &self,
        params: ChatCompletionParams,
    ) -> Result<StreamingResult, CompletionError>;

    /// Performs a non-streaming chat completion request
    async fn chat_completion(
        &self,
        params: ChatCompletionParams,
    ) -> Result<ChatCompletionResponse, CompletionError>;
}

/// Pull a human readable message out of an OpenAI-style error body
///
/// Falls back to the raw body when it is not JSON or has no `error.message`.
pub fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            json.get("error")
                .and_then(|error| error.get("message").or(Some(error)))
                .and_then(|message| message.as_str().map(str::to_string))
        })
        .unwrap_or_else(|| body.to_string())
}
