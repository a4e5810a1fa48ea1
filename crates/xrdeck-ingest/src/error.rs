use crate::archive::{ExtractionError, ValidationError};
use crate::descriptor::DescriptorError;
use xrdeck_core::AppError;
use xrdeck_db::RecordError;
use xrdeck_storage::StorageError;

/// Everything that can go wrong while ingesting one archive
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64, limit: u32 },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(#[from] ExtractionError),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error("Staged archive '{key}' must be under '{prefix}/'")]
    StagedKeyOutsidePrefix { key: String, prefix: String },

    #[error("Failed to fetch staged archive '{key}': {source}")]
    Fetch {
        key: String,
        #[source]
        source: StorageError,
    },

    /// One tile exhausted its retries. Collected by the uploader, never fatal.
    #[error("Upload of {filename} failed after {attempts} attempts: {source}")]
    StorageUploadFailed {
        filename: String,
        attempts: u32,
        #[source]
        source: StorageError,
    },

    #[error("Product record update failed: {0}")]
    RecordUpdateFailed(#[from] RecordError),
}

impl From<&IngestError> for AppError {
    fn from(err: &IngestError) -> Self {
        match err {
            IngestError::RateLimited {
                retry_after_secs,
                limit,
            } => AppError::RateLimited {
                retry_after_secs: *retry_after_secs,
                limit: *limit,
            },
            IngestError::Validation(e) => match e {
                ValidationError::TooLarge { .. } => AppError::PayloadTooLarge(e.to_string()),
                ValidationError::UnsupportedExtension(_) => {
                    AppError::UnsupportedArchive(e.to_string())
                }
                ValidationError::CorruptOrSpoofed { .. }
                | ValidationError::TooManyEntries { .. }
                | ValidationError::ArchiveTooExpanded { .. }
                | ValidationError::Empty => AppError::InvalidArchive(e.to_string()),
            },
            IngestError::ExtractionFailed(e) => AppError::ExtractionFailed(e.to_string()),
            IngestError::Descriptor(e) => AppError::Descriptor(e.to_string()),
            IngestError::StagedKeyOutsidePrefix { .. } => AppError::InvalidInput(err.to_string()),
            IngestError::Fetch { key, source } => match source {
                StorageError::NotFound(_) | StorageError::InvalidKey(_) => {
                    AppError::NotFound(format!("Staged archive '{}' not found", key))
                }
                other => AppError::Storage(other.to_string()),
            },
            IngestError::StorageUploadFailed { .. } => AppError::Storage(err.to_string()),
            IngestError::RecordUpdateFailed(RecordError::NotFound { product_id, .. }) => {
                AppError::NotFound(format!("Product {}", product_id))
            }
            IngestError::RecordUpdateFailed(e) => AppError::RecordUpdateFailed(e.to_string()),
        }
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        AppError::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveFormat;
    use uuid::Uuid;
    use xrdeck_core::ErrorMetadata;

    #[test]
    fn test_validation_errors_map_to_http_codes() {
        let cases = [
            (ValidationError::TooLarge { size: 2, max: 1 }, 413),
            (ValidationError::UnsupportedExtension("7z".into()), 415),
            (
                ValidationError::CorruptOrSpoofed {
                    expected: ArchiveFormat::Zip,
                },
                422,
            ),
            (ValidationError::TooManyEntries { count: 2, max: 1 }, 422),
            (ValidationError::Empty, 422),
        ];
        for (err, status) in cases {
            let app: AppError = IngestError::from(err).into();
            assert_eq!(app.http_status_code(), status);
        }
    }

    #[test]
    fn test_missing_staged_archive_is_not_found() {
        let app: AppError = IngestError::Fetch {
            key: "staging/a.zip".into(),
            source: StorageError::NotFound("staging/a.zip".into()),
        }
        .into();
        assert_eq!(app.http_status_code(), 404);
    }

    #[test]
    fn test_foreign_staged_key_is_invalid_input() {
        let app: AppError = IngestError::StagedKeyOutsidePrefix {
            key: "products/a/b/0_0.png".into(),
            prefix: "staging/c".into(),
        }
        .into();
        assert_eq!(app.http_status_code(), 400);
        assert_eq!(app.error_code(), "INVALID_INPUT");
    }

    #[test]
    fn test_record_failure_is_sensitive() {
        let app: AppError =
            IngestError::RecordUpdateFailed(RecordError::Unavailable("pool timed out".into())).into();
        assert_eq!(app.error_code(), "RECORD_UPDATE_FAILED");
        assert!(app.is_sensitive());

        let missing: AppError = IngestError::RecordUpdateFailed(RecordError::NotFound {
            product_id: Uuid::nil(),
            owner_id: Uuid::nil(),
        })
        .into();
        assert_eq!(missing.http_status_code(), 404);
    }
}
