pub mod chat;
pub mod chats;
pub mod health;
pub mod image;
pub mod projects;

use services::chat::{tools::ImageGenerationProviderTrait, ChatServiceTrait};
use services::projects::ProjectService;
use std::sync::Arc;

/// Services shared by the authenticated route handlers
#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<dyn ChatServiceTrait>,
    pub project_service: Arc<ProjectService>,
    /// Present only when an image generation key is configured
    pub image_provider: Option<Arc<dyn ImageGenerationProviderTrait>>,
}
