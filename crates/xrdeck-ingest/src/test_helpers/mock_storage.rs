//! In-memory storage with failure injection

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use xrdeck_core::StorageBackend;
use xrdeck_storage::{Storage, StorageError, StorageResult};

pub const MOCK_PUBLIC_BASE: &str = "https://cdn.test/bucket";

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
}

/// Mock storage backed by a map. Keys registered with [`MockStorage::fail_always`]
/// or [`MockStorage::fail_times`] reject uploads.
#[derive(Clone, Default)]
pub struct MockStorage {
    objects: Arc<Mutex<HashMap<String, StoredObject>>>,
    /// Remaining forced failures per key; `None` fails forever
    failures: Arc<Mutex<HashMap<String, Option<u32>>>>,
    attempts: Arc<Mutex<HashMap<String, u32>>>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every upload to `key` fails.
    pub fn fail_always(&self, key: &str) {
        self.failures.lock().unwrap().insert(key.to_string(), None);
    }

    /// The next `times` uploads to `key` fail, later ones succeed.
    pub fn fail_times(&self, key: &str, times: u32) {
        self.failures
            .lock()
            .unwrap()
            .insert(key.to_string(), Some(times));
    }

    /// Place an object directly, bypassing failure injection.
    pub fn insert(&self, key: &str, data: impl Into<Bytes>) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                content_type: "application/octet-stream".to_string(),
            },
        );
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Upload attempts seen for `key`, successful or not.
    pub fn attempts(&self, key: &str) -> u32 {
        self.attempts.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|o| o.content_type.clone())
    }

    fn should_fail(&self, key: &str) -> bool {
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(key) {
            Some(None) => true,
            Some(Some(0)) | None => false,
            Some(Some(remaining)) => {
                *remaining -= 1;
                true
            }
        }
    }
}

#[async_trait]
impl Storage for MockStorage {
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<String> {
        *self
            .attempts
            .lock()
            .unwrap()
            .entry(storage_key.to_string())
            .or_insert(0) += 1;

        if self.should_fail(storage_key) {
            return Err(StorageError::UploadFailed(format!(
                "injected failure for {}",
                storage_key
            )));
        }

        self.objects.lock().unwrap().insert(
            storage_key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(storage_key.to_string())
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(storage_key)
            .map(|o| o.data.to_vec())
            .ok_or_else(|| StorageError::NotFound(storage_key.to_string()))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        self.objects.lock().unwrap().remove(storage_key);
        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        Ok(self.contains(storage_key))
    }

    fn public_url(&self, storage_key: &str) -> String {
        format!("{}/{}", MOCK_PUBLIC_BASE, storage_key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
