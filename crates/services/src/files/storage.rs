use super::FileServiceError;
use async_trait::async_trait;
use aws_sdk_s3::{primitives::ByteStream, Client as S3Client};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, error};

/// Trait for file storage operations
#[async_trait]
pub trait StorageTrait: Send + Sync {
    async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), FileServiceError>;

    /// Public URL under which an uploaded object is served
    fn public_url(&self, key: &str) -> String;
}

fn join_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key.trim_start_matches('/'))
}

#[derive(Clone)]
pub struct S3Storage {
    client: S3Client,
    bucket: String,
    public_base_url: String,
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: String, public_base_url: String) -> Self {
        Self {
            client,
            bucket,
            public_base_url,
        }
    }
}

#[async_trait]
impl StorageTrait for S3Storage {
    async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), FileServiceError> {
        debug!(
            "Uploading file to S3: bucket={}, key={}, size={}",
            self.bucket,
            key,
            data.len()
        );

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to upload file to S3: {}", e);
                FileServiceError::StorageError(format!("Failed to upload file: {e}"))
            })?;

        debug!("Successfully uploaded file to S3: {}", key);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        join_url(&self.public_base_url, key)
    }
}

/// In-memory storage for tests and local runs without a bucket
#[derive(Clone)]
pub struct MockStorage {
    files: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    public_base_url: String,
}

impl MockStorage {
    pub fn new(public_base_url: impl Into<String>) -> Self {
        Self {
            files: Arc::new(RwLock::new(HashMap::new())),
            public_base_url: public_base_url.into(),
        }
    }

    /// Bytes stored under `key`, if any
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.files.read().ok()?.get(key).cloned()
    }
}

fn poisoned<T>(_: T) -> FileServiceError {
    FileServiceError::StorageError("storage lock poisoned".to_string())
}

#[async_trait]
impl StorageTrait for MockStorage {
    async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), FileServiceError> {
        debug!("Mock storage: uploading file with key: {}", key);
        self.files
            .write()
            .map_err(poisoned)?
            .insert(key.to_string(), data);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        join_url(&self.public_base_url, key)
    }
}
