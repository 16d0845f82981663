pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, DbPool};
pub use repositories::{
    PgChatRepository, PgFileRepository, PgProjectRepository, PgSessionRepository,
    PgTranscriptStore,
};

use anyhow::Result;
use std::sync::Arc;

/// Database service combining all repositories
pub struct Database {
    pub transcripts: Arc<PgTranscriptStore>,
    pub chats: Arc<PgChatRepository>,
    pub sessions: Arc<PgSessionRepository>,
    pub files: Arc<PgFileRepository>,
    pub projects: Arc<PgProjectRepository>,
    pool: DbPool,
}

impl Database {
    /// Create a new database service from a connection pool
    pub fn new(pool: DbPool) -> Self {
        Self {
            transcripts: Arc::new(PgTranscriptStore::new(pool.clone())),
            chats: Arc::new(PgChatRepository::new(pool.clone())),
            sessions: Arc::new(PgSessionRepository::new(pool.clone())),
            files: Arc::new(PgFileRepository::new(pool.clone())),
            projects: Arc::new(PgProjectRepository::new(pool.clone())),
            pool,
        }
    }

    /// Create a new database service from configuration
    pub async fn from_config(config: &config::DatabaseConfig) -> Result<Self> {
        let pool = create_pool(config).await?;
        Ok(Self::new(pool))
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run(&self.pool).await
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}
