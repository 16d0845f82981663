use axum::{
    extract::{Extension, Json, Path, State},
    http::StatusCode,
};
use services::{auth::AuthenticatedUser, chat::ChatId};

use crate::{
    conversions::{map_chat_error, ApiError},
    models::{ChatListResponse, ChatMessagesResponse, ChatResponse, CreateChatRequest, ErrorResponse},
    routes::AppState,
};

/// Create a chat
///
/// The web app calls this on the first interaction. A client-chosen id is
/// kept; a missing id gets a generated one.
#[utoipa::path(
    post,
    path = "/api/chats",
    request_body = CreateChatRequest,
    responses(
        (status = 201, description = "Chat created", body = ChatResponse),
        (status = 400, description = "Invalid chat id", body = ErrorResponse),
        (status = 409, description = "Chat id already taken", body = ErrorResponse),
    ),
    security(("session_token" = [])),
    tag = "Chats"
)]
pub async fn create_chat(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    body: Option<Json<CreateChatRequest>>,
) -> Result<(StatusCode, Json<ChatResponse>), ApiError> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let chat = app_state
        .chat_service
        .create_chat(&user, request.id.map(ChatId::from))
        .await
        .map_err(map_chat_error)?;
    Ok((StatusCode::CREATED, Json(chat.into())))
}

/// List the caller's chats, most recently updated first
#[utoipa::path(
    get,
    path = "/api/chats",
    responses(
        (status = 200, description = "Chats of the current user", body = ChatListResponse),
    ),
    security(("session_token" = [])),
    tag = "Chats"
)]
pub async fn list_chats(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<ChatListResponse>, ApiError> {
    let chats = app_state
        .chat_service
        .list_chats(&user)
        .await
        .map_err(map_chat_error)?;
    Ok(Json(ChatListResponse {
        data: chats.into_iter().map(ChatResponse::from).collect(),
    }))
}

/// Stored transcript of one of the caller's chats
#[utoipa::path(
    get,
    path = "/api/chats/{id}/messages",
    params(("id" = String, Path, description = "Chat id")),
    responses(
        (status = 200, description = "Messages in order", body = ChatMessagesResponse),
        (status = 404, description = "No such chat for this user", body = ErrorResponse),
    ),
    security(("session_token" = [])),
    tag = "Chats"
)]
pub async fn get_chat_messages(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(chat_id): Path<String>,
) -> Result<Json<ChatMessagesResponse>, ApiError> {
    let chat_id = ChatId::from(chat_id);
    let messages = app_state
        .chat_service
        .load_chat(&chat_id, &user)
        .await
        .map_err(map_chat_error)?;
    Ok(Json(ChatMessagesResponse {
        chat_id: chat_id.0,
        messages,
    }))
}
