//! Ingestion orchestrator
//!
//! Drives one archive through validation, extraction, parsing, tile upload
//! and the product record update, reporting every step on the request's
//! progress stream. The stream always ends with exactly one `complete` or
//! `error` event followed by end-of-stream.
//!
//! Client disconnects do not cancel a run: events are dropped and the upload
//! finishes so the product record stays consistent with storage.

use crate::archive::{extract_archive, validate_archive, ArchiveLimits};
use crate::descriptor::parse_archive;
use crate::error::IngestError;
use crate::progress::{Phase, ProgressDetail, ProgressStream};
use crate::uploader::{BatchConfig, BatchUploader, FailedUpload};
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;
use xrdeck_core::{
    is_staged_key, product_asset_prefix, staging_prefix, AppError, ErrorMetadata, IngestSettings,
    LogLevel, ProductAssetUpdate, ViewerDescriptor,
};
use xrdeck_db::ProductRecordStore;
use xrdeck_storage::Storage;

/// Where the archive bytes come from
#[derive(Debug, Clone)]
pub enum ArchiveSource {
    /// Bytes received in the request body
    Upload { file_name: String, data: Bytes },
    /// An object the client already put under its staging prefix. It is
    /// removed once the run ends.
    Staged {
        storage_path: String,
        file_name: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub product_id: Uuid,
    pub owner_id: Uuid,
    pub source: ArchiveSource,
}

/// Orchestrator states. `Errored` is reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    Idle,
    RateLimitCheck,
    Downloading,
    Validating,
    Extracting,
    Parsing,
    Uploading,
    UpdatingRecord,
    Complete,
    Errored,
}

impl IngestState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, IngestState::Complete | IngestState::Errored)
    }
}

/// Payload of the final `complete` event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestSummary {
    pub product_id: Uuid,
    pub config: ViewerDescriptor,
    pub path: String,
    pub uploaded_images: Vec<String>,
    pub failed_images: Vec<FailedUpload>,
    pub total_images: usize,
    pub uploaded_count: usize,
    pub failed_count: usize,
    pub total_size_mb: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Records the current state and logs each transition.
#[derive(Debug)]
struct StateTracker {
    product_id: Uuid,
    state: IngestState,
    visited: Vec<IngestState>,
}

impl StateTracker {
    fn new(product_id: Uuid, initial: IngestState) -> Self {
        Self {
            product_id,
            state: initial,
            visited: vec![initial],
        }
    }

    fn advance(&mut self, next: IngestState) {
        tracing::debug!(
            product_id = %self.product_id,
            from = ?self.state,
            to = ?next,
            "Ingestion state transition"
        );
        self.state = next;
        self.visited.push(next);
    }
}

/// Outcome of [`IngestionPipeline::run`], with the states the run passed through
#[derive(Debug)]
pub struct IngestOutcome {
    pub result: Result<IngestSummary, IngestError>,
    pub states: Vec<IngestState>,
}

impl IngestOutcome {
    pub fn final_state(&self) -> IngestState {
        self.states.last().copied().unwrap_or(IngestState::Idle)
    }
}

pub struct IngestionPipeline {
    storage: Arc<dyn Storage>,
    products: Arc<dyn ProductRecordStore>,
    settings: IngestSettings,
}

impl IngestionPipeline {
    pub fn new(
        storage: Arc<dyn Storage>,
        products: Arc<dyn ProductRecordStore>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            storage,
            products,
            settings,
        }
    }

    pub fn settings(&self) -> &IngestSettings {
        &self.settings
    }

    /// Run one ingestion to completion and terminate `stream`.
    ///
    /// The caller has already passed the rate-limit gate.
    #[tracing::instrument(
        skip(self, request, stream),
        fields(product_id = %request.product_id, owner_id = %request.owner_id)
    )]
    pub async fn run(&self, request: IngestRequest, stream: &ProgressStream) -> IngestOutcome {
        let start = std::time::Instant::now();
        let mut tracker = StateTracker::new(request.product_id, IngestState::RateLimitCheck);

        let result = self.execute(&request, stream, &mut tracker).await;

        if let ArchiveSource::Staged { storage_path, .. } = &request.source {
            if is_staged_key(request.owner_id, storage_path) {
                self.discard_staged(storage_path).await;
            }
        }

        match &result {
            Ok(summary) => {
                tracker.advance(IngestState::Complete);
                tracing::info!(
                    uploaded = summary.uploaded_count,
                    failed = summary.failed_count,
                    total_size_mb = summary.total_size_mb,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Ingestion complete"
                );
                let message = if summary.failed_count == 0 {
                    format!("Imported {} images", summary.uploaded_count)
                } else {
                    format!(
                        "Imported {} of {} images, {} failed",
                        summary.uploaded_count, summary.total_images, summary.failed_count
                    )
                };
                stream.send_complete(message, summary.clone());
            }
            Err(err) => {
                let failed_in = tracker.state;
                tracker.advance(IngestState::Errored);
                let app_error = AppError::from(err);
                match app_error.log_level() {
                    LogLevel::Debug => {
                        tracing::debug!(error = %err, state = ?failed_in, "Ingestion rejected")
                    }
                    LogLevel::Warn => {
                        tracing::warn!(error = %err, state = ?failed_in, "Ingestion failed")
                    }
                    LogLevel::Error => {
                        tracing::error!(error = %err, state = ?failed_in, "Ingestion failed")
                    }
                }
                stream.send_error(app_error.client_message(), Some(app_error.error_code()));
            }
        }
        stream.close();

        IngestOutcome {
            result,
            states: tracker.visited,
        }
    }

    async fn execute(
        &self,
        request: &IngestRequest,
        stream: &ProgressStream,
        tracker: &mut StateTracker,
    ) -> Result<IngestSummary, IngestError> {
        let (file_name, data) = match &request.source {
            ArchiveSource::Upload { file_name, data } => (file_name.clone(), data.clone()),
            ArchiveSource::Staged {
                storage_path,
                file_name,
            } => {
                if !is_staged_key(request.owner_id, storage_path) {
                    return Err(IngestError::StagedKeyOutsidePrefix {
                        key: storage_path.clone(),
                        prefix: staging_prefix(request.owner_id),
                    });
                }
                tracker.advance(IngestState::Downloading);
                stream.send_progress(
                    Phase::Downloading,
                    "Downloading archive",
                    ProgressDetail::default(),
                );
                let bytes = self
                    .storage
                    .download(storage_path)
                    .await
                    .map_err(|source| IngestError::Fetch {
                        key: storage_path.clone(),
                        source,
                    })?;
                let name = file_name.clone().unwrap_or_else(|| {
                    storage_path
                        .rsplit('/')
                        .next()
                        .unwrap_or(storage_path.as_str())
                        .to_string()
                });
                (name, Bytes::from(bytes))
            }
        };

        let limits = ArchiveLimits::from(&self.settings);

        tracker.advance(IngestState::Validating);
        stream.send_progress(
            Phase::Validating,
            format!("Validating {}", file_name),
            ProgressDetail::default(),
        );
        let format = validate_archive(&data, &file_name, &limits)?;

        tracker.advance(IngestState::Extracting);
        stream.send_progress(
            Phase::Extracting,
            "Extracting archive",
            ProgressDetail::default(),
        );
        let entries = extract_archive(&data, format, &limits)?;
        drop(data);

        tracker.advance(IngestState::Parsing);
        stream.send_progress(
            Phase::Parsing,
            "Reading viewer configuration",
            ProgressDetail {
                total: Some(entries.len()),
                ..ProgressDetail::default()
            },
        );
        let parsed = parse_archive(&entries)?;
        drop(entries);

        let prefix = product_asset_prefix(request.owner_id, request.product_id);
        let total_images = parsed.tiles.len();

        tracker.advance(IngestState::Uploading);
        stream.send_progress(
            Phase::UploadingImages,
            format!("Uploading {} images", total_images),
            ProgressDetail {
                current: Some(0),
                total: Some(total_images),
                percentage: Some(0),
                ..ProgressDetail::default()
            },
        );
        let uploader = BatchUploader::new(self.storage.clone(), BatchConfig::from(&self.settings));
        let batch = uploader
            .upload_all(parsed.tiles.into_iter().collect(), &prefix, |progress| {
                stream.send_progress(
                    Phase::UploadingImages,
                    format!("Uploaded {} of {} images", progress.uploaded, progress.total),
                    ProgressDetail {
                        current: Some(progress.uploaded),
                        total: Some(progress.total),
                        percentage: Some(progress.percentage),
                        failed: Some(progress.failed),
                        filename: progress.last_filename.clone(),
                    },
                );
            })
            .await;

        tracker.advance(IngestState::UpdatingRecord);
        stream.send_progress(
            Phase::UpdatingProduct,
            "Updating product",
            ProgressDetail::default(),
        );
        let update = ProductAssetUpdate {
            config: parsed.descriptor.to_json(),
            path: prefix.clone(),
            weight: batch.total_size_mb,
            cover_image: batch.cover_image_url.clone(),
        };
        self.products
            .update_assets(request.product_id, request.owner_id, &update)
            .await?;

        Ok(IngestSummary {
            product_id: request.product_id,
            config: parsed.descriptor,
            path: prefix,
            uploaded_count: batch.uploaded_images.len(),
            failed_count: batch.failures.len(),
            total_images,
            uploaded_images: batch.uploaded_images,
            failed_images: batch.failures,
            total_size_mb: batch.total_size_mb,
            cover_image_url: batch.cover_image_url,
            base_url: batch.base_url,
        })
    }

    /// Best-effort removal of a staged archive once the run is over.
    async fn discard_staged(&self, storage_path: &str) {
        match self.storage.delete(storage_path).await {
            Ok(()) => tracing::debug!(key = %storage_path, "Staged archive removed"),
            Err(e) => {
                tracing::warn!(key = %storage_path, error = %e, "Failed to remove staged archive")
            }
        }
    }
}
