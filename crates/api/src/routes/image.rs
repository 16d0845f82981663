use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
};
use base64::Engine;
use services::auth::AuthenticatedUser;
use services::chat::tools::ImageGenerationError;
use tracing::{debug, error};

use crate::{
    conversions::{api_error, ApiError},
    models::{ErrorResponse, ImageRequest, ImageResponse},
    routes::AppState,
};

/// Generate an image outside of a chat
#[utoipa::path(
    post,
    path = "/api/image",
    request_body = ImageRequest,
    responses(
        (status = 200, description = "Generated image", body = ImageResponse),
        (status = 400, description = "Missing prompt", body = ErrorResponse),
        (status = 502, description = "Image model failed", body = ErrorResponse),
        (status = 503, description = "Image generation is not configured", body = ErrorResponse),
    ),
    security(("session_token" = [])),
    tag = "Images"
)]
pub async fn generate_image(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<ImageRequest>,
) -> Result<Json<ImageResponse>, ApiError> {
    request
        .validate()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e, "invalid_request_error"))?;

    let Some(provider) = app_state.image_provider.as_ref() else {
        return Err(api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Image generation is not configured",
            "service_unavailable",
        ));
    };

    debug!(user_id = %user.id, "Generating image");
    let image = provider.generate(request.prompt).await.map_err(|e| {
        error!(user_id = %user.id, error = %e, "Image generation failed");
        match e {
            ImageGenerationError::NoImage => api_error(
                StatusCode::BAD_GATEWAY,
                "The image model returned no image",
                "model_error",
            ),
            _ => api_error(
                StatusCode::BAD_GATEWAY,
                "Failed to generate image",
                "model_error",
            ),
        }
    })?;

    Ok(Json(ImageResponse {
        base64: base64::engine::general_purpose::STANDARD.encode(&image.data),
        media_type: image.media_type,
    }))
}
