use std::sync::Arc;

use inference_providers::{ChatCompletionParams, InferenceProvider};

use super::convert::convert_to_model_messages;
use super::errors::TitleError;
use super::models::{ChatId, Message};
use super::ports::ChatRepository;

pub const TITLE_SYSTEM_PROMPT: &str = "You are a messages summarizer. You take the prompts and \
extract the topics efficiently in least possible words. This title will be given to the chat. \
Do not include markdown, just plain text. Never say no topic and never say anything like varied \
topics. If there are multiple topics separate them by commas. Never exceed more than 4 words.";

pub const MAX_TITLE_WORDS: usize = 4;

/// Normalise model output into a short plain-text title.
///
/// Strips markdown markers and quotes, collapses whitespace and keeps at
/// most four words. Returns `None` when nothing is left.
pub fn sanitize_title(raw: &str) -> Option<String> {
    let first_line = raw.lines().find(|line| !line.trim().is_empty())?;
    let cleaned: String = first_line
        .chars()
        .filter(|c| !matches!(c, '#' | '*' | '_' | '`' | '"' | '“' | '”'))
        .collect();

    let words: Vec<&str> = cleaned
        .split_whitespace()
        .take(MAX_TITLE_WORDS)
        .collect();
    if words.is_empty() {
        return None;
    }

    let title = words
        .join(" ")
        .trim_end_matches(|c: char| matches!(c, ',' | '.' | ':' | ';'))
        .to_string();
    (!title.is_empty()).then_some(title)
}

/// Names a chat after its first exchange
pub struct TitleGenerator {
    provider: Arc<dyn InferenceProvider>,
    chat_repository: Arc<dyn ChatRepository>,
    model: String,
}

impl TitleGenerator {
    pub fn new(
        provider: Arc<dyn InferenceProvider>,
        chat_repository: Arc<dyn ChatRepository>,
        model: String,
    ) -> Self {
        Self {
            provider,
            chat_repository,
            model,
        }
    }

    pub async fn generate(
        &self,
        chat_id: &ChatId,
        messages: &[Message],
    ) -> Result<String, TitleError> {
        let params = ChatCompletionParams::new(
            self.model.clone(),
            convert_to_model_messages(messages, TITLE_SYSTEM_PROMPT),
        );

        let response = self
            .provider
            .chat_completion(params)
            .await
            .map_err(|e| TitleError::Model(e.to_string()))?;

        let title = response
            .first_content()
            .and_then(sanitize_title)
            .ok_or(TitleError::Empty)?;

        self.chat_repository.update_title(chat_id, &title).await?;
        tracing::info!(chat_id = %chat_id, title = %title, "Chat title updated");
        Ok(title)
    }

    /// Fire-and-forget; failures are logged and never reach the caller
    pub fn spawn(self: &Arc<Self>, chat_id: ChatId, messages: Vec<Message>) {
        let generator = self.clone();
        tokio::spawn(async move {
            if let Err(e) = generator.generate(&chat_id, &messages).await {
                tracing::warn!(chat_id = %chat_id, error = %e, "Failed to generate chat title");
            }
        });
    }
}
