//! Product record store that records every update

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;
use xrdeck_core::ProductAssetUpdate;
use xrdeck_db::{ProductRecordStore, RecordError};

/// Mock product store. Accepts any product unless [`MockProductStore::fail_updates`]
/// was called.
#[derive(Clone, Default)]
pub struct MockProductStore {
    updates: Arc<Mutex<Vec<(Uuid, Uuid, ProductAssetUpdate)>>>,
    fail: Arc<AtomicBool>,
}

impl MockProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following update fail with [`RecordError::Unavailable`].
    pub fn fail_updates(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    /// All accepted updates as `(product_id, owner_id, update)`.
    pub fn updates(&self) -> Vec<(Uuid, Uuid, ProductAssetUpdate)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    /// Latest update for `product_id` as `(owner_id, update)`.
    pub fn last_update(&self, product_id: Uuid) -> Option<(Uuid, ProductAssetUpdate)> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(id, _, _)| *id == product_id)
            .map(|(_, owner, update)| (*owner, update.clone()))
    }
}

#[async_trait]
impl ProductRecordStore for MockProductStore {
    async fn update_assets(
        &self,
        product_id: Uuid,
        owner_id: Uuid,
        update: &ProductAssetUpdate,
    ) -> Result<(), RecordError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RecordError::Unavailable("injected failure".to_string()));
        }
        self.updates
            .lock()
            .unwrap()
            .push((product_id, owner_id, update.clone()));
        Ok(())
    }
}
