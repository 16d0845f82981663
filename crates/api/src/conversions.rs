use axum::{http::StatusCode, Json};
use services::chat::{Chat, ChatError};
use services::common::RepositoryError;
use services::projects::{Project, ProjectError};

use crate::models::{ChatResponse, ErrorResponse, ProjectResponse};

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, message: impl Into<String>, error_type: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse::new(message.into(), error_type.to_string())),
    )
}

impl From<Chat> for ChatResponse {
    fn from(chat: Chat) -> Self {
        Self {
            id: chat.id.0,
            title: chat.title,
            created_at: chat.created_at,
            updated_at: chat.updated_at,
        }
    }
}

impl From<Project> for ProjectResponse {
    fn from(project: Project) -> Self {
        Self {
            id: project.id,
            url: project.url,
            title: project.title,
            files: project.files,
            created_at: project.created_at,
        }
    }
}

/// Map a chat service error to its HTTP status and JSON body
pub fn map_chat_error(error: ChatError) -> ApiError {
    match error {
        ChatError::InvalidParams(message) => {
            api_error(StatusCode::BAD_REQUEST, message, "invalid_request_error")
        }
        ChatError::Unauthorized => {
            api_error(StatusCode::UNAUTHORIZED, "Unauthorized", "unauthorized")
        }
        ChatError::NotFound(id) => api_error(
            StatusCode::NOT_FOUND,
            format!("Chat not found: {id}"),
            "not_found",
        ),
        ChatError::ModelError(message) => {
            tracing::error!(error = %message, "Model request failed");
            api_error(StatusCode::BAD_GATEWAY, message, "model_error")
        }
        ChatError::Persistence(RepositoryError::AlreadyExists) => api_error(
            StatusCode::CONFLICT,
            "Chat already exists",
            "conflict",
        ),
        ChatError::Persistence(e) => {
            tracing::error!(error = %e, "Chat persistence failed");
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to access chat storage",
                "internal_error",
            )
        }
        ChatError::InternalError(message) => {
            tracing::error!(error = %message, "Chat service internal error");
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                "internal_error",
            )
        }
    }
}

pub fn map_project_error(error: ProjectError) -> ApiError {
    match error {
        ProjectError::NotFound => {
            api_error(StatusCode::NOT_FOUND, "Project not found", "not_found")
        }
        ProjectError::InvalidParams(message) => {
            api_error(StatusCode::BAD_REQUEST, message, "invalid_request_error")
        }
        ProjectError::Repository(e) => {
            tracing::error!(error = %e, "Project lookup failed");
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load project",
                "internal_error",
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_statuses() {
        let cases = [
            (ChatError::InvalidParams("bad".into()), StatusCode::BAD_REQUEST),
            (ChatError::Unauthorized, StatusCode::UNAUTHORIZED),
            (ChatError::NotFound("c1".into()), StatusCode::NOT_FOUND),
            (ChatError::ModelError("down".into()), StatusCode::BAD_GATEWAY),
            (
                ChatError::Persistence(RepositoryError::AlreadyExists),
                StatusCode::CONFLICT,
            ),
            (
                ChatError::Persistence(RepositoryError::ConnectionFailed("refused".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(map_chat_error(error).0, status);
        }
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let (_, Json(body)) = map_chat_error(ChatError::InternalError("pool exhausted".into()));
        assert_eq!(body.error.message, "Internal server error");
        assert_eq!(body.error.r#type, "internal_error");
    }
}
