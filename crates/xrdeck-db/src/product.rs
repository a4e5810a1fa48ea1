use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;
use xrdeck_core::{AppError, ProductAssetUpdate};

/// Errors returned by product record stores
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Product {product_id} not found for owner {owner_id}")]
    NotFound { product_id: Uuid, owner_id: Uuid },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Product store unavailable: {0}")]
    Unavailable(String),
}

impl From<RecordError> for AppError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::NotFound { product_id, .. } => {
                AppError::NotFound(format!("Product {}", product_id))
            }
            RecordError::Database(e) => AppError::Database(e.to_string()),
            RecordError::Unavailable(msg) => AppError::Database(msg),
        }
    }
}

/// Write access to product records, scoped to the owning account.
#[async_trait]
pub trait ProductRecordStore: Send + Sync {
    /// Persist the ingested asset fields onto an existing product.
    ///
    /// `cover_image: None` leaves any existing cover untouched.
    async fn update_assets(
        &self,
        product_id: Uuid,
        owner_id: Uuid,
        update: &ProductAssetUpdate,
    ) -> Result<(), RecordError>;
}

/// Postgres-backed product repository
#[derive(Clone)]
pub struct PgProductRepository {
    pool: PgPool,
}

impl PgProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductRecordStore for PgProductRepository {
    #[tracing::instrument(
        skip(self, update),
        fields(db.table = "products", db.operation = "update", db.record_id = %product_id)
    )]
    async fn update_assets(
        &self,
        product_id: Uuid,
        owner_id: Uuid,
        update: &ProductAssetUpdate,
    ) -> Result<(), RecordError> {
        let result = sqlx::query::<Postgres>(
            r#"
            UPDATE products
            SET config = $1,
                path = $2,
                weight = $3,
                cover_image = COALESCE($4, cover_image),
                updated_at = NOW()
            WHERE id = $5 AND owner_id = $6
            "#,
        )
        .bind(sqlx::types::Json(&update.config))
        .bind(&update.path)
        .bind(update.weight)
        .bind(update.cover_image.as_deref())
        .bind(product_id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RecordError::NotFound {
                product_id,
                owner_id,
            });
        }

        tracing::debug!(weight = update.weight, path = %update.path, "Product assets updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let err: AppError = RecordError::NotFound {
            product_id: Uuid::nil(),
            owner_id: Uuid::nil(),
        }
        .into();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_unavailable_maps_to_database_error() {
        let err: AppError = RecordError::Unavailable("pool closed".to_string()).into();
        assert!(matches!(err, AppError::Database(msg) if msg == "pool closed"));
    }
}
