use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(any(test, feature = "test-mocks"))]
use mockall::automock;

/// Result from a web search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Parameters for web search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WebSearchParams {
    /// The user's search query term (required)
    pub query: String,

    /// Number of search results (max 20)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,

    /// Freshness filter: "pd" (24h), "pw" (7d), "pm" (31d), "py" (365d)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freshness: Option<String>,
}

impl WebSearchParams {
    /// Create a new WebSearchParams with just a query
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WebSearchError {
    #[error("Web search failed: {0}")]
    WebSearchRequestFailed(String),
    #[error("Web search response parsing failed: {0}")]
    WebSearchResponseParsingFailed(String),
}

/// Web search provider trait
#[cfg_attr(any(test, feature = "test-mocks"), automock)]
#[async_trait]
pub trait WebSearchProviderTrait: Send + Sync {
    async fn search(&self, params: WebSearchParams)
        -> Result<Vec<WebSearchResult>, WebSearchError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub sender_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailReceipt {
    pub id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Email request failed: {0}")]
    RequestFailed(String),
    #[error("Email provider rejected the message: {status} {body}")]
    Rejected { status: u16, body: String },
}

#[cfg_attr(any(test, feature = "test-mocks"), automock)]
#[async_trait]
pub trait EmailProviderTrait: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<EmailReceipt, EmailError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pub data: Vec<u8>,
    pub media_type: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ImageGenerationError {
    #[error("Image generation request failed: {0}")]
    RequestFailed(String),
    #[error("Image generation returned HTTP {status}: {body}")]
    HttpError { status: u16, body: String },
    #[error("Image generation returned no image")]
    NoImage,
    #[error("Image payload could not be decoded: {0}")]
    InvalidPayload(String),
}

#[cfg_attr(any(test, feature = "test-mocks"), automock)]
#[async_trait]
pub trait ImageGenerationProviderTrait: Send + Sync {
    /// Generate one image for the prompt
    async fn generate(&self, prompt: String) -> Result<GeneratedImage, ImageGenerationError>;
}

/// An app scaffolded by the delegated code generation service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuiltApp {
    pub demo_url: String,
    pub files: serde_json::Value,
}

#[derive(Debug, thiserror::Error)]
pub enum AppBuilderError {
    #[error("App builder request failed: {0}")]
    RequestFailed(String),
    #[error("App builder returned HTTP {status}: {body}")]
    HttpError { status: u16, body: String },
    #[error("App builder response was missing {0}")]
    MissingField(&'static str),
}

#[cfg_attr(any(test, feature = "test-mocks"), automock)]
#[async_trait]
pub trait AppBuilderProviderTrait: Send + Sync {
    async fn build_app(&self, prompt: String) -> Result<BuiltApp, AppBuilderError>;
}
