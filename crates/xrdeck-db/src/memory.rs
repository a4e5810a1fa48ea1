//! Process-local product store used when no database is configured.

use crate::product::{ProductRecordStore, RecordError};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;
use xrdeck_core::ProductAssetUpdate;

/// Asset fields of one product as last written.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredProduct {
    pub owner_id: Uuid,
    pub config: serde_json::Value,
    pub path: String,
    pub weight: f64,
    pub cover_image: Option<String>,
}

/// In-memory product store.
///
/// Unknown products are created on first update unless the store is `strict`,
/// in which case only products registered with [`InMemoryProductStore::insert`]
/// can be updated.
#[derive(Default)]
pub struct InMemoryProductStore {
    products: RwLock<HashMap<Uuid, StoredProduct>>,
    strict: bool,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict() -> Self {
        Self {
            products: RwLock::new(HashMap::new()),
            strict: true,
        }
    }

    /// Register an empty product owned by `owner_id`.
    pub async fn insert(&self, product_id: Uuid, owner_id: Uuid) {
        self.products.write().await.insert(
            product_id,
            StoredProduct {
                owner_id,
                config: serde_json::Value::Null,
                path: String::new(),
                weight: 0.0,
                cover_image: None,
            },
        );
    }

    pub async fn get(&self, product_id: Uuid) -> Option<StoredProduct> {
        self.products.read().await.get(&product_id).cloned()
    }
}

#[async_trait]
impl ProductRecordStore for InMemoryProductStore {
    async fn update_assets(
        &self,
        product_id: Uuid,
        owner_id: Uuid,
        update: &ProductAssetUpdate,
    ) -> Result<(), RecordError> {
        let mut products = self.products.write().await;

        match products.get_mut(&product_id) {
            Some(existing) if existing.owner_id == owner_id => {
                existing.config = update.config.clone();
                existing.path = update.path.clone();
                existing.weight = update.weight;
                if update.cover_image.is_some() {
                    existing.cover_image = update.cover_image.clone();
                }
                Ok(())
            }
            Some(_) => Err(RecordError::NotFound {
                product_id,
                owner_id,
            }),
            None if self.strict => Err(RecordError::NotFound {
                product_id,
                owner_id,
            }),
            None => {
                products.insert(
                    product_id,
                    StoredProduct {
                        owner_id,
                        config: update.config.clone(),
                        path: update.path.clone(),
                        weight: update.weight,
                        cover_image: update.cover_image.clone(),
                    },
                );
                Ok(())
            }
        }
    }
}
