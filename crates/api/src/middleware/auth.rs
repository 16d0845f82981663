use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use services::auth::{AuthError, AuthServiceTrait, SessionToken};
use std::sync::Arc;
use tracing::{debug, error};

use crate::conversions::{api_error, ApiError};

#[derive(Clone)]
pub struct AuthState {
    pub auth_service: Arc<dyn AuthServiceTrait>,
    /// Name of the cookie the web app keeps its session token in
    pub session_cookie: String,
}

impl AuthState {
    pub fn new(auth_service: Arc<dyn AuthServiceTrait>, session_cookie: String) -> Self {
        Self {
            auth_service,
            session_cookie,
        }
    }
}

/// Resolve the caller's session and attach the `AuthenticatedUser` to the
/// request. Accepts `Authorization: Bearer <token>` or the session cookie.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = session_token(request.headers(), &state.session_cookie) else {
        debug!("Request without session credentials");
        return Err(api_error(
            StatusCode::UNAUTHORIZED,
            "Missing session token",
            "unauthorized",
        ));
    };

    match state.auth_service.validate_session(token).await {
        Ok(user) => {
            debug!(user_id = %user.id, "Authenticated request");
            request.extensions_mut().insert(user);
            Ok(next.run(request).await)
        }
        Err(AuthError::SessionNotFound) => Err(api_error(
            StatusCode::UNAUTHORIZED,
            "Invalid or expired session",
            "unauthorized",
        )),
        Err(AuthError::InternalError(e)) => {
            error!(error = %e, "Failed to validate session");
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to validate session",
                "internal_error",
            ))
        }
    }
}

fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<SessionToken> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if let Some(token) = bearer {
        return Some(SessionToken(token.to_string()));
    }

    let jar = CookieJar::from_headers(headers);
    let cookie = jar.get(cookie_name)?;
    // Signed cookies are `<token>.<signature>`
    let token = cookie
        .value()
        .split_once('.')
        .map_or(cookie.value(), |(token, _)| token);
    (!token.is_empty()).then(|| SessionToken(token.to_string()))
}
