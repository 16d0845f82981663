//! OpenAI-compatible provider
//!
//! Works with any endpoint that speaks OpenAI's chat completions format,
//! including OpenRouter, OpenAI itself and self-hosted vLLM servers.

use crate::{
    extract_error_message, models::StreamOptions, sse_parser::SSEParser, ChatCompletionParams,
    ChatCompletionResponse, CompletionError, InferenceProvider, StreamingResult,
};
use async_trait::async_trait;
use reqwest::{header::HeaderValue, Client};
use std::time::Duration;

/// Connection settings for an OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL for the provider API, without the `/chat/completions` suffix
    pub base_url: String,
    pub api_key: String,
    pub timeout_seconds: u64,
}

pub struct OpenAiCompatibleProvider {
    client: Client,
    config: ProviderConfig,
}

impl OpenAiCompatibleProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| CompletionError::Unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn build_headers(&self) -> Result<reqwest::header::HeaderMap, CompletionError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));

        let auth_value = format!("Bearer {}", self.config.api_key);
        let header_value = HeaderValue::from_str(&auth_value).map_err(|e| {
            CompletionError::CompletionError(format!("Invalid API key format: {e}"))
        })?;
        headers.insert("Authorization", header_value);

        Ok(headers)
    }

    async fn post(
        &self,
        params: &ChatCompletionParams,
    ) -> Result<reqwest::Response, CompletionError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .headers(self.build_headers()?)
            .timeout(Duration::from_secs(self.config.timeout_seconds))
            .json(params)
            .send()
            .await
            .map_err(|e| CompletionError::CompletionError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error response body: {e}"));
            tracing::warn!(status, model = %params.model, "Model provider returned an error");
            return Err(CompletionError::HttpError {
                status,
                message: extract_error_message(&error_text),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl InferenceProvider for OpenAiCompatibleProvider {
    async fn chat_completion_stream(
        &self,
        params: ChatCompletionParams,
    ) -> Result<StreamingResult, CompletionError> {
        let mut streaming_params = params;
        streaming_params.stream = Some(true);
        streaming_params.stream_options = Some(StreamOptions {
            include_usage: Some(true),
        });

        let response = self.post(&streaming_params).await?;
        let sse_stream = SSEParser::new(Box::pin(response.bytes_stream()));
        Ok(Box::pin(sse_stream))
    }

    async fn chat_completion(
        &self,
        params: ChatCompletionParams,
    ) -> Result<ChatCompletionResponse, CompletionError> {
        let mut non_streaming_params = params;
        non_streaming_params.stream = Some(false);

        let response = self.post(&non_streaming_params).await?;
        let raw_bytes = response
            .bytes()
            .await
            .map_err(|e| CompletionError::CompletionError(e.to_string()))?;

        serde_json::from_slice(&raw_bytes)
            .map_err(|e| CompletionError::InvalidResponse(format!("Failed to parse response: {e}")))
    }
}
