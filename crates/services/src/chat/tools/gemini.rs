use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use super::ports::{GeneratedImage, ImageGenerationError, ImageGenerationProviderTrait};

static GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiImageProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ContentPart>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentPart {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    /// Base64 encoded bytes
    pub data: String,
}

impl GenerateContentResponse {
    /// First inline image of the response, decoded
    pub fn into_image(self) -> Result<GeneratedImage, ImageGenerationError> {
        let inline = self
            .candidates
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .flat_map(|content| content.parts)
            .find_map(|part| part.inline_data.filter(|d| d.mime_type.starts_with("image/")))
            .ok_or(ImageGenerationError::NoImage)?;

        let data = STANDARD
            .decode(inline.data.as_bytes())
            .map_err(|e| ImageGenerationError::InvalidPayload(e.to_string()))?;

        Ok(GeneratedImage {
            data,
            media_type: inline.mime_type,
        })
    }
}

impl GeminiImageProvider {
    pub fn new(
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, ImageGenerationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ImageGenerationError::RequestFailed(e.to_string()))?;
        Ok(Self {
            api_key,
            model,
            client,
        })
    }
}

#[async_trait::async_trait]
impl ImageGenerationProviderTrait for GeminiImageProvider {
    async fn generate(&self, prompt: String) -> Result<GeneratedImage, ImageGenerationError> {
        let url = format!("{}/{}:generateContent", GEMINI_API_BASE, self.model);
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "responseModalities": ["TEXT", "IMAGE"] }
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ImageGenerationError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, model = %self.model, "Gemini image generation failed: {}", body);
            return Err(ImageGenerationError::HttpError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ImageGenerationError::InvalidPayload(e.to_string()))?;
        parsed.into_image()
    }
}
