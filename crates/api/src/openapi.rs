use crate::models::*;
use crate::routes::health::HealthResponse;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Chat Assistant API",
        description = "Streaming chat assistant with tool use.\n\n## Authentication\n\nSend the session token as `Authorization: Bearer <token>` or in the session cookie set by the web app.",
        version = "1.0.0",
        license(name = "MIT")
    ),
    paths(
        crate::routes::chat::chat_stream,
        crate::routes::chats::create_chat,
        crate::routes::chats::list_chats,
        crate::routes::chats::get_chat_messages,
        crate::routes::projects::get_project,
        crate::routes::image::generate_image,
        crate::routes::health::health_check,
    ),
    components(
        schemas(
            ChatRequest, CreateChatRequest, ChatResponse, ChatListResponse,
            ChatMessagesResponse, ProjectResponse, ImageRequest, ImageResponse,
            ErrorResponse, ErrorDetail, HealthResponse,
        ),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session_token",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
            components.add_security_scheme(
                "session_cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(
                    "better-auth.session_token",
                ))),
            );
        }
    }
}
