use std::{convert::Infallible, time::Duration};

use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use futures::StreamExt;
use services::auth::AuthenticatedUser;
use tracing::debug;

use crate::{
    consts::{
        INCLUDED, REASONING_HEADER, SOURCES_HEADER, SSE_KEEP_ALIVE_SECS, STREAM_VERSION,
        STREAM_VERSION_HEADER,
    },
    conversions::{api_error, map_chat_error, ApiError},
    models::{ChatRequest, ErrorResponse},
    routes::AppState,
};

/// Run one assistant turn
///
/// Streams the turn as server-sent events, one JSON stream event per `data:`
/// line, ending with a `stream-end` event. Closing the connection stops
/// generation; whatever was produced is still stored.
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Stream of chat events", content_type = "text/event-stream"),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 404, description = "Chat belongs to another user", body = ErrorResponse),
    ),
    security(("session_token" = [])),
    tag = "Chat"
)]
pub async fn chat_stream(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    request
        .validate()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e, "invalid_request_error"))?;

    debug!(
        chat_id = %request.id,
        user_id = %user.id,
        messages = request.messages.len(),
        web_search = request.web_search,
        "Chat stream request"
    );

    let stream = app_state
        .chat_service
        .create_chat_stream(request.into_stream_request(), user)
        .await
        .map_err(map_chat_error)?;

    let sse_stream = stream.map(|event| {
        Ok::<_, Infallible>(Event::default().data(serde_json::to_string(&event).unwrap_or_default()))
    });

    let headers = [
        (STREAM_VERSION_HEADER, STREAM_VERSION),
        (SOURCES_HEADER, INCLUDED),
        (REASONING_HEADER, INCLUDED),
    ];
    Ok((
        headers,
        Sse::new(sse_stream).keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(SSE_KEEP_ALIVE_SECS))
                .text("keep-alive"),
        ),
    )
        .into_response())
}
