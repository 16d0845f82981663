#![allow(dead_code)]

use api::{build_app, init_auth_services, init_domain_services, Repositories, ToolComponents};
use chrono::Utc;
use config::ApiConfig;
use inference_providers::MockProvider;
use services::auth::{AuthenticatedUser, UserId};
use services::chat::tools::{
    ImageGenerationProviderTrait, ToolRegistry, WebSearchProviderTrait, WebSearchToolExecutor,
};
use services::memory::InMemorySessionRepository;
use std::{sync::Arc, time::Duration};

pub const SESSION_TOKEN: &str = "session-ada";
pub const OTHER_SESSION_TOKEN: &str = "session-grace";
pub const SESSION_COOKIE: &str = "better-auth.session_token";

pub struct TestContext {
    pub server: axum_test::TestServer,
    pub provider: MockProvider,
    pub repositories: Repositories,
}

#[derive(Default)]
pub struct TestOptions {
    pub web_search: Option<Arc<dyn WebSearchProviderTrait>>,
    pub image_provider: Option<Arc<dyn ImageGenerationProviderTrait>>,
}

pub fn test_config() -> ApiConfig {
    let mut config = ApiConfig::default();
    config.chat.smoothing.delay_ms = 0;
    config.chat.tool_timeout_secs = 5;
    config
}

pub fn ada() -> AuthenticatedUser {
    AuthenticatedUser {
        id: UserId::from("user-ada"),
        name: "Ada".to_string(),
        email: Some("ada@example.com".to_string()),
    }
}

pub fn grace() -> AuthenticatedUser {
    AuthenticatedUser {
        id: UserId::from("user-grace"),
        name: "Grace".to_string(),
        email: None,
    }
}

pub async fn setup_test_server() -> TestContext {
    setup_test_server_with(TestOptions::default()).await
}

/// In-memory repositories, a scripted model and two signed-in users
pub async fn setup_test_server_with(options: TestOptions) -> TestContext {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::level_filters::LevelFilter::DEBUG)
        .try_init();

    let config = test_config();

    let sessions = Arc::new(InMemorySessionRepository::new());
    let expires_at = Utc::now() + chrono::Duration::hours(1);
    sessions.insert(SESSION_TOKEN, ada(), expires_at).await;
    sessions.insert(OTHER_SESSION_TOKEN, grace(), expires_at).await;

    let mut repositories = Repositories::in_memory();
    repositories.sessions = sessions;

    let mut registry = ToolRegistry::new(Duration::from_secs(config.chat.tool_timeout_secs));
    if let Some(search) = options.web_search {
        registry.register(Arc::new(WebSearchToolExecutor::new(search)));
    }

    let provider = MockProvider::new();
    let auth_state = init_auth_services(repositories.sessions.clone(), &config);
    let app_state = init_domain_services(
        Arc::new(provider.clone()),
        &repositories,
        ToolComponents {
            registry,
            image_provider: options.image_provider,
        },
        &config,
    );

    let server = axum_test::TestServer::new(build_app(app_state, auth_state)).unwrap();
    TestContext {
        server,
        provider,
        repositories,
    }
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// `data:` payloads of an SSE body, in order
pub fn sse_events(body: &str) -> Vec<serde_json::Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).expect("Event is not JSON"))
        .collect()
}

pub fn event_types(events: &[serde_json::Value]) -> Vec<String> {
    events
        .iter()
        .map(|event| event["type"].as_str().unwrap_or_default().to_string())
        .collect()
}

pub fn streamed_text(events: &[serde_json::Value]) -> String {
    events
        .iter()
        .filter(|event| event["type"] == "text-delta")
        .filter_map(|event| event["delta"].as_str())
        .collect()
}

pub fn user_message(id: &str, text: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "role": "user",
        "parts": [{"type": "text", "text": text}]
    })
}
