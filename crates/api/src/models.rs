use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use services::chat::{ChatStreamRequest, Message};
use utoipa::{IntoParams, ToSchema};

use crate::consts::{MAX_CHAT_ID_LENGTH, MAX_IMAGE_PROMPT_LENGTH, MAX_MESSAGES_PER_REQUEST};

/// Body of `POST /api/chat`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Client-generated chat id
    pub id: String,
    /// Full message history, ending with the new user message
    #[schema(value_type = Vec<Object>)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub model: Option<String>,
    /// Answer with the web search model instead of tools
    #[serde(default)]
    pub web_search: bool,
}

impl ChatRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("id is required".to_string());
        }
        if self.id.len() > MAX_CHAT_ID_LENGTH {
            return Err(format!(
                "id must be at most {MAX_CHAT_ID_LENGTH} characters"
            ));
        }
        if self.messages.len() > MAX_MESSAGES_PER_REQUEST {
            return Err(format!(
                "at most {MAX_MESSAGES_PER_REQUEST} messages are accepted per request"
            ));
        }
        Ok(())
    }

    pub fn into_stream_request(self) -> ChatStreamRequest {
        ChatStreamRequest {
            chat_id: self.id.into(),
            messages: self.messages,
            model: self.model.filter(|model| !model.trim().is_empty()),
            web_search: self.web_search,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CreateChatRequest {
    /// Keep a client-chosen id instead of generating one
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatResponse {
    pub id: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatListResponse {
    pub data: Vec<ChatResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatMessagesResponse {
    pub chat_id: String,
    #[schema(value_type = Vec<Object>)]
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProjectQuery {
    /// Demo URL returned by the app builder
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProjectResponse {
    pub id: uuid::Uuid,
    pub url: String,
    pub title: String,
    #[schema(value_type = Object)]
    pub files: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ImageRequest {
    pub prompt: String,
}

impl ImageRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.prompt.trim().is_empty() {
            return Err("prompt is required".to_string());
        }
        if self.prompt.chars().count() > MAX_IMAGE_PROMPT_LENGTH {
            return Err(format!(
                "prompt must be at most {MAX_IMAGE_PROMPT_LENGTH} characters"
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageResponse {
    /// Base64 of the raw image bytes
    pub base64: String,
    pub media_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
}

impl ErrorResponse {
    pub fn new(message: String, error_type: String) -> Self {
        Self {
            error: ErrorDetail {
                message,
                r#type: error_type,
            },
        }
    }
}
