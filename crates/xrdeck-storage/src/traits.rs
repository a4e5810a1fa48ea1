//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// One object for [`Storage::upload_many`].
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub key: String,
    pub data: Bytes,
    pub content_type: String,
}

/// Storage abstraction trait
///
/// Every call may fail transiently; callers that need retries layer them on
/// top (see the batch uploader in `xrdeck-ingest`).
#[async_trait]
pub trait Storage: Send + Sync {
    /// Upload data to a specific storage key, overwriting any existing object.
    /// Returns the storage key that was written.
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<String>;

    /// Upload several objects concurrently. Results are returned in input order.
    async fn upload_many(&self, items: Vec<UploadItem>) -> Vec<StorageResult<String>> {
        let uploads = items
            .iter()
            .map(|item| self.upload_with_key(&item.key, item.data.clone(), &item.content_type));
        futures::future::join_all(uploads).await
    }

    /// Download a file by its storage key
    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    /// Delete a file by its storage key. Deleting a missing key is not an error.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Check if a file exists
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Publicly reachable URL for a storage key. Pure; does not check existence.
    fn public_url(&self, storage_key: &str) -> String;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
