use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::executor::{parse_input, ToolExecutionContext, ToolExecutor, ToolOutput};
use super::ports::AppBuilderProviderTrait;
use crate::chat::errors::ToolError;
use crate::projects::{NewProject, ProjectRepository};

pub const APP_BUILDER_TOOL_NAME: &str = "appBuilder";

const MAX_PROJECT_TITLE_CHARS: usize = 80;

#[derive(Debug, Deserialize)]
struct AppBuilderInput {
    prompt: String,
}

/// Delegates app scaffolding to the code generation service and records
/// the result as a project
pub struct AppBuilderToolExecutor {
    provider: Arc<dyn AppBuilderProviderTrait>,
    project_repository: Arc<dyn ProjectRepository>,
}

impl AppBuilderToolExecutor {
    pub fn new(
        provider: Arc<dyn AppBuilderProviderTrait>,
        project_repository: Arc<dyn ProjectRepository>,
    ) -> Self {
        Self {
            provider,
            project_repository,
        }
    }
}

fn project_title(prompt: &str) -> String {
    let prompt = prompt.trim();
    match prompt.char_indices().nth(MAX_PROJECT_TITLE_CHARS) {
        Some((cut, _)) => format!("{}...", prompt[..cut].trim_end()),
        None => prompt.to_string(),
    }
}

#[async_trait]
impl ToolExecutor for AppBuilderToolExecutor {
    fn name(&self) -> &str {
        APP_BUILDER_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Build a small web app from a description. Returns a live demo URL and the generated files."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": {"type": "string", "description": "What the app should do and look like"}
            },
            "required": ["prompt"]
        })
    }

    async fn execute(
        &self,
        input: &Value,
        context: &ToolExecutionContext<'_>,
    ) -> Result<ToolOutput, ToolError> {
        let input: AppBuilderInput = parse_input(self.name(), input)?;
        let title = project_title(&input.prompt);

        let app = self
            .provider
            .build_app(input.prompt)
            .await
            .map_err(|e| ToolError::execution(APP_BUILDER_TOOL_NAME, e))?;

        tracing::info!(chat_id = %context.chat_id, demo_url = %app.demo_url, "App scaffolded");

        if let Err(e) = self
            .project_repository
            .record(NewProject {
                user_id: context.user.id.clone(),
                url: app.demo_url.clone(),
                title,
                files: app.files.clone(),
            })
            .await
        {
            tracing::warn!(user_id = %context.user.id, error = %e, "Failed to record project");
        }

        Ok(ToolOutput::Json(json!({
            "webUrl": app.demo_url,
            "files": app.files,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthenticatedUser, UserId};
    use crate::chat::models::ChatId;
    use crate::chat::tools::ports::{BuiltApp, MockAppBuilderProviderTrait};
    use crate::projects::ports::{MockProjectRepository, Project};

    #[test]
    fn test_project_title() {
        assert_eq!(project_title("  a todo app "), "a todo app");
        let long = "x".repeat(100);
        let title = project_title(&long);
        assert_eq!(title.len(), MAX_PROJECT_TITLE_CHARS + 3);
        assert!(title.ends_with("..."));
    }

    #[tokio::test]
    async fn test_builds_and_records_project() {
        let mut provider = MockAppBuilderProviderTrait::new();
        provider
            .expect_build_app()
            .withf(|prompt| prompt == "a todo app")
            .returning(|_| {
                Ok(BuiltApp {
                    demo_url: "https://demo.v0.dev/abc".to_string(),
                    files: json!([{"name": "app.tsx"}]),
                })
            });

        let mut projects = MockProjectRepository::new();
        projects
            .expect_record()
            .withf(|project| {
                project.url == "https://demo.v0.dev/abc"
                    && project.title == "a todo app"
                    && project.user_id.0 == "u1"
            })
            .times(1)
            .returning(|project| {
                Ok(Project {
                    id: uuid::Uuid::new_v4(),
                    user_id: project.user_id,
                    url: project.url,
                    title: project.title,
                    files: project.files,
                    created_at: chrono::Utc::now(),
                })
            });

        let executor = AppBuilderToolExecutor::new(Arc::new(provider), Arc::new(projects));
        let chat_id = ChatId::from("c1");
        let user = AuthenticatedUser {
            id: UserId::from("u1"),
            name: "Ada".to_string(),
            email: None,
        };
        let output = executor
            .execute(
                &json!({"prompt": "a todo app"}),
                &ToolExecutionContext {
                    chat_id: &chat_id,
                    user: &user,
                },
            )
            .await
            .unwrap();

        assert_eq!(
            output.to_value(),
            json!({"webUrl": "https://demo.v0.dev/abc", "files": [{"name": "app.tsx"}]})
        );
    }
}
