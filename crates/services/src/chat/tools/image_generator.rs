//! Image generation tool: generate, upload to object storage, record the
//! file for the user and hand the public URL back.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::executor::{parse_input, ToolExecutionContext, ToolExecutor, ToolOutput};
use super::ports::ImageGenerationProviderTrait;
use crate::chat::errors::ToolError;
use crate::files::{new_storage_key, FileRepository, StorageTrait};

pub const IMAGE_TOOL_NAME: &str = "imageGenerator";

#[derive(Debug, Deserialize)]
struct ImageInput {
    prompt: String,
}

pub struct ImageGeneratorToolExecutor {
    provider: Arc<dyn ImageGenerationProviderTrait>,
    storage: Arc<dyn StorageTrait>,
    file_repository: Arc<dyn FileRepository>,
}

impl ImageGeneratorToolExecutor {
    pub fn new(
        provider: Arc<dyn ImageGenerationProviderTrait>,
        storage: Arc<dyn StorageTrait>,
        file_repository: Arc<dyn FileRepository>,
    ) -> Self {
        Self {
            provider,
            storage,
            file_repository,
        }
    }
}

#[async_trait]
impl ToolExecutor for ImageGeneratorToolExecutor {
    fn name(&self) -> &str {
        IMAGE_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Generate an image from a text description. Returns the URL of the generated image."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": {"type": "string", "description": "Detailed description of the image"}
            },
            "required": ["prompt"]
        })
    }

    fn blocks_turn_completion(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        input: &Value,
        context: &ToolExecutionContext<'_>,
    ) -> Result<ToolOutput, ToolError> {
        let input: ImageInput = parse_input(self.name(), input)?;
        if input.prompt.trim().is_empty() {
            return Err(ToolError::invalid_input(self.name(), "prompt must not be empty"));
        }

        let image = self
            .provider
            .generate(input.prompt)
            .await
            .map_err(|e| ToolError::execution(IMAGE_TOOL_NAME, e))?;

        let key = new_storage_key(&image.media_type)
            .map_err(|e| ToolError::execution(IMAGE_TOOL_NAME, e))?;
        let size = image.data.len();
        self.storage
            .upload(&key, image.data, &image.media_type)
            .await
            .map_err(|e| ToolError::execution(IMAGE_TOOL_NAME, e))?;
        let url = self.storage.public_url(&key);

        tracing::info!(
            chat_id = %context.chat_id,
            key = %key,
            size,
            "Generated image uploaded"
        );

        // Best effort; the upload already succeeded
        if let Err(e) = self
            .file_repository
            .record(&context.user.id, &url, &image.media_type)
            .await
        {
            tracing::warn!(user_id = %context.user.id, error = %e, "Failed to record generated file");
        }

        Ok(ToolOutput::Image {
            url,
            media_type: image.media_type,
        })
    }
}
