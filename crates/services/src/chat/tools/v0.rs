use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::ports::{AppBuilderError, AppBuilderProviderTrait, BuiltApp};

static V0_CHATS_URL: &str = "https://api.v0.dev/v1/chats";

const V0_SYSTEM_PROMPT: &str = "You are an expert coder";
const V0_MODEL_ID: &str = "v0-1.5-sm";

pub struct V0AppBuilderProvider {
    api_key: String,
    client: reqwest::Client,
}

/// Chat created by the v0 Platform API. Older responses carry `demo` and
/// `files` at the top level, newer ones under `latestVersion`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct V0ChatResponse {
    #[serde(default)]
    pub demo: Option<String>,
    #[serde(default)]
    pub files: Option<Value>,
    #[serde(default)]
    pub latest_version: Option<V0Version>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct V0Version {
    #[serde(default)]
    pub demo_url: Option<String>,
    #[serde(default)]
    pub files: Option<Value>,
}

impl V0ChatResponse {
    pub fn into_built_app(self) -> Result<BuiltApp, AppBuilderError> {
        let (version_demo, version_files) = match self.latest_version {
            Some(version) => (version.demo_url, version.files),
            None => (None, None),
        };
        let demo_url = self
            .demo
            .or(version_demo)
            .ok_or(AppBuilderError::MissingField("demo"))?;
        Ok(BuiltApp {
            demo_url,
            files: self.files.or(version_files).unwrap_or_else(|| json!([])),
        })
    }
}

impl V0AppBuilderProvider {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, AppBuilderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppBuilderError::RequestFailed(e.to_string()))?;
        Ok(Self { api_key, client })
    }
}

#[async_trait::async_trait]
impl AppBuilderProviderTrait for V0AppBuilderProvider {
    async fn build_app(&self, prompt: String) -> Result<BuiltApp, AppBuilderError> {
        let body = json!({
            "system": V0_SYSTEM_PROMPT,
            "message": prompt,
            "modelConfiguration": { "modelId": V0_MODEL_ID }
        });

        let response = self
            .client
            .post(V0_CHATS_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppBuilderError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, "v0 chat creation failed: {}", body);
            return Err(AppBuilderError::HttpError {
                status: status.as_u16(),
                body,
            });
        }

        let chat: V0ChatResponse = response
            .json()
            .await
            .map_err(|e| AppBuilderError::RequestFailed(e.to_string()))?;
        chat.into_built_app()
    }
}
