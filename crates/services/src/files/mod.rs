pub mod ports;
pub mod storage;

pub use ports::{FileRepository, StoredFile};
pub use storage::{MockStorage, S3Storage, StorageTrait};

use crate::common::{generate_id, RepositoryError};
use crate::id_prefixes::PREFIX_FILE;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileServiceError {
    #[error("Invalid file type: {0}")]
    InvalidFileType(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
}

/// Image types the generators may return, with their file extension
pub const IMAGE_MEDIA_TYPES: &[(&str, &str)] = &[
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/webp", "webp"),
    ("image/gif", "gif"),
];

pub fn extension_for(media_type: &str) -> Result<&'static str, FileServiceError> {
    IMAGE_MEDIA_TYPES
        .iter()
        .find(|(mime, _)| *mime == media_type)
        .map(|(_, ext)| *ext)
        .ok_or_else(|| FileServiceError::InvalidFileType(media_type.to_string()))
}

/// Object key for a new generated file, e.g. `generated/file-Ab3....png`
pub fn new_storage_key(media_type: &str) -> Result<String, FileServiceError> {
    let extension = extension_for(media_type)?;
    Ok(format!(
        "generated/{}.{}",
        generate_id(PREFIX_FILE, 24),
        extension
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("image/png").unwrap(), "png");
        assert_eq!(extension_for("image/jpeg").unwrap(), "jpg");
        assert!(matches!(
            extension_for("application/pdf"),
            Err(FileServiceError::InvalidFileType(_))
        ));
    }

    #[test]
    fn test_new_storage_key() {
        let key = new_storage_key("image/webp").unwrap();
        assert!(key.starts_with("generated/file-"));
        assert!(key.ends_with(".webp"));
        assert_ne!(key, new_storage_key("image/webp").unwrap());
    }
}
