use axum::extract::{Extension, Json, Query, State};
use services::auth::AuthenticatedUser;

use crate::{
    conversions::{map_project_error, ApiError},
    models::{ErrorResponse, ProjectQuery, ProjectResponse},
    routes::AppState,
};

/// Look up an app builder project by its demo URL
#[utoipa::path(
    get,
    path = "/api/projects",
    params(ProjectQuery),
    responses(
        (status = 200, description = "Project files and metadata", body = ProjectResponse),
        (status = 400, description = "Missing url", body = ErrorResponse),
        (status = 404, description = "No such project for this user", body = ErrorResponse),
    ),
    security(("session_token" = [])),
    tag = "Projects"
)]
pub async fn get_project(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<ProjectQuery>,
) -> Result<Json<ProjectResponse>, ApiError> {
    let project = app_state
        .project_service
        .find_by_url(&query.url, &user)
        .await
        .map_err(map_project_error)?;
    Ok(Json(project.into()))
}
