pub mod consts;
pub mod conversions;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod routes;

use crate::{
    middleware::{auth_middleware, AuthState},
    openapi::ApiDoc,
    routes::{
        chat::chat_stream,
        chats::{create_chat, get_chat_messages, list_chats},
        health::health_check,
        image::generate_image,
        projects::get_project,
        AppState,
    },
};
use anyhow::Context;
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use config::{ApiConfig, ObjectStorageConfig};
use database::Database;
use inference_providers::{InferenceProvider, OpenAiCompatibleProvider, ProviderConfig};
use services::{
    auth::{AuthService, AuthServiceTrait, MockAuthService, SessionRepository},
    chat::{
        tools::{
            AppBuilderToolExecutor, BraveWebSearchProvider, EmailToolExecutor,
            GeminiImageProvider, ImageGenerationProviderTrait, ImageGeneratorToolExecutor,
            ResendEmailProvider, ToolRegistry, V0AppBuilderProvider, WebSearchToolExecutor,
        },
        ChatRepository, ChatServiceImpl, TranscriptStore,
    },
    files::{FileRepository, MockStorage, S3Storage, StorageTrait},
    memory::{
        InMemoryChatRepository, InMemoryFileRepository, InMemoryProjectRepository,
        InMemorySessionRepository, InMemoryTranscriptStore,
    },
    projects::{ProjectRepository, ProjectService},
};
use std::{sync::Arc, time::Duration};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

/// Storage ports behind the services, either Postgres or in-memory
#[derive(Clone)]
pub struct Repositories {
    pub transcripts: Arc<dyn TranscriptStore>,
    pub chats: Arc<dyn ChatRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub files: Arc<dyn FileRepository>,
    pub projects: Arc<dyn ProjectRepository>,
}

impl Repositories {
    pub fn from_database(database: &Database) -> Self {
        Self {
            transcripts: database.transcripts.clone(),
            chats: database.chats.clone(),
            sessions: database.sessions.clone(),
            files: database.files.clone(),
            projects: database.projects.clone(),
        }
    }

    /// Nothing survives a restart; for local runs and tests
    pub fn in_memory() -> Self {
        Self {
            transcripts: Arc::new(InMemoryTranscriptStore::new()),
            chats: Arc::new(InMemoryChatRepository::new()),
            sessions: Arc::new(InMemorySessionRepository::new()),
            files: Arc::new(InMemoryFileRepository::new()),
            projects: Arc::new(InMemoryProjectRepository::new()),
        }
    }
}

/// Tools available to the model plus the image provider the direct image
/// endpoint shares with the image tool
pub struct ToolComponents {
    pub registry: ToolRegistry,
    pub image_provider: Option<Arc<dyn ImageGenerationProviderTrait>>,
}

/// Initialize database connection and run migrations
pub async fn init_database(db_config: &config::DatabaseConfig) -> anyhow::Result<Arc<Database>> {
    let database = Database::from_config(db_config)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Starting database migrations...");
    database
        .run_migrations()
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations completed.");

    Ok(Arc::new(database))
}

pub async fn init_repositories(config: &ApiConfig) -> anyhow::Result<Repositories> {
    match &config.database {
        Some(db_config) => {
            let database = init_database(db_config).await?;
            Ok(Repositories::from_database(&database))
        }
        None => {
            tracing::warn!("No database configured, chats are kept in memory");
            Ok(Repositories::in_memory())
        }
    }
}

pub fn init_auth_services(sessions: Arc<dyn SessionRepository>, config: &ApiConfig) -> AuthState {
    let auth_service: Arc<dyn AuthServiceTrait> = if config.auth.mock {
        tracing::warn!("Mock authentication enabled, any session token is accepted");
        Arc::new(MockAuthService)
    } else {
        Arc::new(AuthService::new(sessions))
    };
    AuthState::new(auth_service, config.auth.session_cookie.clone())
}

pub async fn init_storage(config: &ObjectStorageConfig) -> Arc<dyn StorageTrait> {
    match &config.bucket {
        Some(bucket) => {
            let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
            if let Some(region) = &config.region {
                loader = loader.region(aws_sdk_s3::config::Region::new(region.clone()));
            }
            let s3_config = loader.load().await;
            let public_base_url = config
                .public_base_url
                .clone()
                .unwrap_or_else(|| format!("https://{bucket}.s3.amazonaws.com"));
            tracing::info!(bucket = %bucket, "Storing generated files in S3");
            Arc::new(S3Storage::new(
                aws_sdk_s3::Client::new(&s3_config),
                bucket.clone(),
                public_base_url,
            ))
        }
        None => {
            tracing::warn!("No object storage bucket configured, files are kept in memory");
            Arc::new(MockStorage::new(
                config
                    .public_base_url
                    .clone()
                    .unwrap_or_else(|| "memory://files".to_string()),
            ))
        }
    }
}

/// Register every tool whose third-party key is configured
pub fn init_tools(
    config: &ApiConfig,
    repositories: &Repositories,
    storage: Arc<dyn StorageTrait>,
) -> anyhow::Result<ToolComponents> {
    let providers = &config.providers;
    let timeout = Duration::from_secs(config.chat.tool_timeout_secs);
    let mut registry = ToolRegistry::new(timeout);

    if let Some(api_key) = &providers.brave_api_key {
        let provider = BraveWebSearchProvider::new(api_key.clone(), timeout)
            .context("Failed to create web search provider")?;
        registry.register(Arc::new(WebSearchToolExecutor::new(Arc::new(provider))));
    }

    if let Some(api_key) = &providers.resend_api_key {
        let provider = ResendEmailProvider::new(
            api_key.clone(),
            providers.email_from_address.clone(),
            timeout,
        )
        .context("Failed to create email provider")?;
        registry.register(Arc::new(EmailToolExecutor::new(Arc::new(provider))));
    }

    let image_provider = match &providers.gemini_api_key {
        Some(api_key) => {
            let provider: Arc<dyn ImageGenerationProviderTrait> = Arc::new(
                GeminiImageProvider::new(
                    api_key.clone(),
                    providers.gemini_image_model.clone(),
                    timeout,
                )
                .context("Failed to create image provider")?,
            );
            registry.register(Arc::new(ImageGeneratorToolExecutor::new(
                provider.clone(),
                storage,
                repositories.files.clone(),
            )));
            Some(provider)
        }
        None => None,
    };

    if let Some(api_key) = &providers.v0_api_key {
        let provider = V0AppBuilderProvider::new(api_key.clone(), timeout)
            .context("Failed to create app builder provider")?;
        registry.register(Arc::new(AppBuilderToolExecutor::new(
            Arc::new(provider),
            repositories.projects.clone(),
        )));
    }

    let names: Vec<String> = registry
        .definitions()
        .into_iter()
        .map(|definition| definition.function.name)
        .collect();
    tracing::info!(tools = ?names, "Tools registered");

    Ok(ToolComponents {
        registry,
        image_provider,
    })
}

pub fn init_inference_provider(config: &ApiConfig) -> anyhow::Result<Arc<dyn InferenceProvider>> {
    let model = &config.providers.model;
    if model.api_key.is_empty() {
        tracing::warn!("MODEL_API_KEY is not set, model requests will be rejected upstream");
    }
    let provider = OpenAiCompatibleProvider::new(ProviderConfig {
        base_url: model.base_url.clone(),
        api_key: model.api_key.clone(),
        timeout_seconds: model.timeout_seconds,
    })
    .context("Failed to create model provider")?;
    Ok(Arc::new(provider))
}

pub fn init_domain_services(
    inference_provider: Arc<dyn InferenceProvider>,
    repositories: &Repositories,
    tools: ToolComponents,
    config: &ApiConfig,
) -> AppState {
    let chat_service = ChatServiceImpl::new(
        inference_provider,
        repositories.transcripts.clone(),
        repositories.chats.clone(),
        Arc::new(tools.registry),
        config.chat.clone(),
    );

    AppState {
        chat_service: Arc::new(chat_service),
        project_service: Arc::new(ProjectService::new(repositories.projects.clone())),
        image_provider: tools.image_provider,
    }
}

/// Wire every service from configuration and build the router
pub async fn build_app_with_config(config: &ApiConfig) -> anyhow::Result<Router> {
    let repositories = init_repositories(config).await?;
    let auth_state = init_auth_services(repositories.sessions.clone(), config);
    let storage = init_storage(&config.object_storage).await;
    let tools = init_tools(config, &repositories, storage)?;
    let inference_provider = init_inference_provider(config)?;
    let app_state = init_domain_services(inference_provider, &repositories, tools, config);

    Ok(build_app(app_state, auth_state))
}

pub fn build_app(app_state: AppState, auth_state: AuthState) -> Router {
    let authenticated_routes = Router::new()
        .route("/api/chat", post(chat_stream))
        .route("/api/chats", post(create_chat).get(list_chats))
        .route("/api/chats/{id}/messages", get(get_chat_messages))
        .route("/api/projects", get(get_project))
        .route("/api/image", post(generate_image))
        .with_state(app_state)
        .layer(from_fn_with_state(auth_state, auth_middleware));

    Router::new()
        .merge(authenticated_routes)
        .merge(build_public_routes())
        .layer(TraceLayer::new_for_http())
}

pub fn build_public_routes() -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
}
