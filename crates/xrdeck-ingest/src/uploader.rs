//! Batched tile upload with per-file retry
//!
//! Tiles are sorted naturally, split into fixed-size batches, and each batch is
//! uploaded concurrently. Batches run one after another with a pause in
//! between. A tile that still fails after its last attempt is recorded and the
//! run carries on.

use crate::error::IngestError;
use crate::sort::natural_cmp;
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use xrdeck_core::IngestSettings;
use xrdeck_storage::{tile_key, Storage};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Batching and retry parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub batch_delay: Duration,
    /// Attempts per tile, including the first one
    pub max_retries: u32,
    /// Delay before retry `n` is `n * retry_base_delay`
    pub retry_base_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self::from(&IngestSettings::default())
    }
}

impl From<&IngestSettings> for BatchConfig {
    fn from(settings: &IngestSettings) -> Self {
        Self {
            batch_size: settings.batch_size.max(1),
            batch_delay: Duration::from_millis(settings.batch_delay_ms),
            max_retries: settings.max_retries.max(1),
            retry_base_delay: Duration::from_millis(settings.retry_base_delay_ms),
        }
    }
}

/// A tile that could not be uploaded
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedUpload {
    pub filename: String,
    pub error: String,
}

/// Aggregate outcome of [`BatchUploader::upload_all`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult {
    /// Storage keys of uploaded tiles, in natural order
    pub uploaded_images: Vec<String>,
    pub failures: Vec<FailedUpload>,
    /// Sum of all tile sizes in MB, rounded to two decimals
    pub total_size_mb: f64,
    pub cover_image_url: Option<String>,
    /// Cover URL without its final path segment
    pub base_url: Option<String>,
}

/// Cumulative state reported after each batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadProgress {
    pub uploaded: usize,
    pub failed: usize,
    pub total: usize,
    pub percentage: u8,
    /// Last tile of the batch that just finished
    pub last_filename: Option<String>,
    pub batch: usize,
    pub batches: usize,
}

/// Content type for a tile, from its extension.
pub fn content_type_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}

fn round_mb(bytes: u64) -> f64 {
    ((bytes as f64 / BYTES_PER_MB) * 100.0).round() / 100.0
}

fn strip_last_segment(url: &str) -> String {
    match url.rsplit_once('/') {
        Some((base, _)) => base.to_string(),
        None => url.to_string(),
    }
}

pub struct BatchUploader {
    storage: Arc<dyn Storage>,
    config: BatchConfig,
}

impl BatchUploader {
    pub fn new(storage: Arc<dyn Storage>, config: BatchConfig) -> Self {
        Self { storage, config }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Upload one tile, retrying with linear backoff.
    async fn upload_with_retry(
        &self,
        key: &str,
        filename: &str,
        data: Bytes,
    ) -> Result<String, IngestError> {
        let content_type = content_type_for(filename);
        let mut attempt = 1;
        loop {
            match self
                .storage
                .upload_with_key(key, data.clone(), content_type)
                .await
            {
                Ok(stored) => return Ok(stored),
                Err(e) if attempt < self.config.max_retries => {
                    let delay = self.config.retry_base_delay * attempt;
                    tracing::debug!(
                        key = %key,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Tile upload failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::warn!(key = %key, attempts = attempt, error = %e, "Tile upload gave up");
                    return Err(IngestError::StorageUploadFailed {
                        filename: filename.to_string(),
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }

    /// Upload every tile under `prefix`.
    ///
    /// Never fails as a whole: per-tile failures end up in
    /// [`BatchResult::failures`]. `on_progress` fires once per finished batch.
    #[tracing::instrument(skip(self, tiles, on_progress), fields(tiles = tiles.len()))]
    pub async fn upload_all<F>(
        &self,
        mut tiles: Vec<(String, Bytes)>,
        prefix: &str,
        mut on_progress: F,
    ) -> BatchResult
    where
        F: FnMut(&UploadProgress) + Send,
    {
        tiles.sort_by(|(a, _), (b, _)| natural_cmp(a, b));

        let total = tiles.len();
        let total_bytes: u64 = tiles.iter().map(|(_, data)| data.len() as u64).sum();
        let batches = total.div_ceil(self.config.batch_size);
        let start = std::time::Instant::now();

        let mut result = BatchResult {
            total_size_mb: round_mb(total_bytes),
            ..BatchResult::default()
        };

        for (index, batch) in tiles.chunks(self.config.batch_size).enumerate() {
            if index > 0 && !self.config.batch_delay.is_zero() {
                tokio::time::sleep(self.config.batch_delay).await;
            }

            let uploads = batch.iter().map(|(filename, data)| {
                let key = tile_key(prefix, filename);
                async move {
                    let outcome = self.upload_with_retry(&key, filename, data.clone()).await;
                    (filename, outcome)
                }
            });
            let outcomes = futures::future::join_all(uploads).await;

            for (filename, outcome) in outcomes {
                match outcome {
                    Ok(key) => result.uploaded_images.push(key),
                    Err(e) => result.failures.push(FailedUpload {
                        filename: filename.clone(),
                        error: e.to_string(),
                    }),
                }
            }

            let done = result.uploaded_images.len() + result.failures.len();
            let progress = UploadProgress {
                uploaded: result.uploaded_images.len(),
                failed: result.failures.len(),
                total,
                percentage: ((done * 100) / total.max(1)) as u8,
                last_filename: batch.last().map(|(name, _)| name.clone()),
                batch: index + 1,
                batches,
            };
            tracing::debug!(
                batch = progress.batch,
                batches,
                uploaded = progress.uploaded,
                failed = progress.failed,
                "Batch finished"
            );
            on_progress(&progress);
        }

        if let Some(first) = result.uploaded_images.first() {
            let cover = self.storage.public_url(first);
            result.base_url = Some(strip_last_segment(&cover));
            result.cover_image_url = Some(cover);
        }

        tracing::info!(
            uploaded = result.uploaded_images.len(),
            failed = result.failures.len(),
            total_size_mb = result.total_size_mb,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Tile upload finished"
        );

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::MockStorage;

    fn fast_config(batch_size: usize) -> BatchConfig {
        BatchConfig {
            batch_size,
            batch_delay: Duration::ZERO,
            max_retries: 3,
            retry_base_delay: Duration::from_millis(1),
        }
    }

    fn tiles(names: &[&str]) -> Vec<(String, Bytes)> {
        names
            .iter()
            .map(|n| (n.to_string(), Bytes::from(vec![0u8; 1024])))
            .collect()
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("0_0.png"), "image/png");
        assert_eq!(content_type_for("0_0.PNG"), "image/png");
        assert_eq!(content_type_for("0_0.jpg"), "image/jpeg");
        assert_eq!(content_type_for("0_0.JPEG"), "image/jpeg");
        assert_eq!(content_type_for("notes"), "application/octet-stream");
    }

    #[test]
    fn test_round_mb() {
        assert_eq!(round_mb(0), 0.0);
        assert_eq!(round_mb(1024 * 1024), 1.0);
        assert_eq!(round_mb(1536 * 1024), 1.5);
        assert_eq!(round_mb(10_000), 0.01);
    }

    #[test]
    fn test_config_from_settings_clamps() {
        let settings = IngestSettings {
            batch_size: 0,
            max_retries: 0,
            ..IngestSettings::default()
        };
        let config = BatchConfig::from(&settings);
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.max_retries, 1);
    }

    #[tokio::test]
    async fn test_uploads_all_in_natural_order() {
        let storage = Arc::new(MockStorage::new());
        let uploader = BatchUploader::new(storage.clone(), fast_config(2));

        let result = uploader
            .upload_all(tiles(&["1_0.png", "0_10.png", "0_0.png", "0_2.png"]), "products/o/p", |_| {})
            .await;

        assert_eq!(
            result.uploaded_images,
            vec![
                "products/o/p/0_0.png",
                "products/o/p/0_2.png",
                "products/o/p/0_10.png",
                "products/o/p/1_0.png"
            ]
        );
        assert!(result.failures.is_empty());
        assert_eq!(
            result.cover_image_url.as_deref(),
            Some("https://cdn.test/bucket/products/o/p/0_0.png")
        );
        assert_eq!(
            result.base_url.as_deref(),
            Some("https://cdn.test/bucket/products/o/p")
        );
        assert_eq!(storage.content_type("products/o/p/0_0.png").as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_persistent_failure_recorded_after_all_attempts() {
        let storage = Arc::new(MockStorage::new());
        storage.fail_always("products/o/p/0_1.png");
        let uploader = BatchUploader::new(storage.clone(), fast_config(2));

        let result = uploader
            .upload_all(
                tiles(&["0_0.png", "0_1.png", "0_2.png", "0_3.png", "0_4.png"]),
                "products/o/p",
                |_| {},
            )
            .await;

        assert_eq!(result.uploaded_images.len(), 4);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].filename, "0_1.png");
        assert_eq!(storage.attempts("products/o/p/0_1.png"), 3);
        assert_eq!(storage.attempts("products/o/p/0_0.png"), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_recovers() {
        let storage = Arc::new(MockStorage::new());
        storage.fail_times("products/o/p/0_0.png", 2);
        let uploader = BatchUploader::new(storage.clone(), fast_config(4));

        let result = uploader
            .upload_all(tiles(&["0_0.png", "0_1.png"]), "products/o/p", |_| {})
            .await;

        assert!(result.failures.is_empty());
        assert_eq!(storage.attempts("products/o/p/0_0.png"), 3);
        assert_eq!(
            result.cover_image_url.as_deref(),
            Some("https://cdn.test/bucket/products/o/p/0_0.png")
        );
    }

    #[tokio::test]
    async fn test_cover_skips_failed_first_tile() {
        let storage = Arc::new(MockStorage::new());
        storage.fail_always("products/o/p/0_0.png");
        let uploader = BatchUploader::new(storage.clone(), fast_config(8));

        let result = uploader
            .upload_all(tiles(&["0_0.png", "0_1.png"]), "products/o/p", |_| {})
            .await;

        assert_eq!(
            result.cover_image_url.as_deref(),
            Some("https://cdn.test/bucket/products/o/p/0_1.png")
        );
    }

    #[tokio::test]
    async fn test_all_failures_return_normally() {
        let storage = Arc::new(MockStorage::new());
        storage.fail_always("products/o/p/0_0.png");
        storage.fail_always("products/o/p/0_1.png");
        let uploader = BatchUploader::new(storage, fast_config(8));

        let result = uploader
            .upload_all(tiles(&["0_0.png", "0_1.png"]), "products/o/p", |_| {})
            .await;

        assert!(result.uploaded_images.is_empty());
        assert_eq!(result.failures.len(), 2);
        assert_eq!(result.cover_image_url, None);
        assert_eq!(result.base_url, None);
        assert_eq!(result.total_size_mb, 0.0);
    }

    #[tokio::test]
    async fn test_progress_fires_once_per_batch() {
        let storage = Arc::new(MockStorage::new());
        let uploader = BatchUploader::new(storage, fast_config(3));
        let mut seen = Vec::new();

        let names: Vec<String> = (0..7).map(|i| format!("0_{i}.png")).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        uploader
            .upload_all(tiles(&names), "products/o/p", |p| seen.push(p.clone()))
            .await;

        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].uploaded, 3);
        assert_eq!(seen[0].percentage, 42);
        assert_eq!(seen[0].last_filename.as_deref(), Some("0_2.png"));
        assert_eq!(seen[2].uploaded, 7);
        assert_eq!(seen[2].percentage, 100);
        assert_eq!(seen[2].batch, 3);
        assert_eq!(seen[2].batches, 3);
    }

    #[tokio::test]
    async fn test_uploaded_plus_failed_equals_total() {
        for failing in [0usize, 1, 3, 6] {
            let storage = Arc::new(MockStorage::new());
            for i in 0..failing {
                storage.fail_always(&format!("p/t_{i}.jpg"));
            }
            let uploader = BatchUploader::new(storage, fast_config(4));
            let names: Vec<String> = (0..6).map(|i| format!("t_{i}.jpg")).collect();
            let names: Vec<&str> = names.iter().map(String::as_str).collect();

            let result = uploader.upload_all(tiles(&names), "p", |_| {}).await;
            assert_eq!(result.uploaded_images.len(), 6 - result.failures.len());
            assert_eq!(result.failures.len(), failing);
        }
    }
}
