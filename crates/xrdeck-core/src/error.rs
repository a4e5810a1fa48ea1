//! Error types module
//!
//! All errors that reach a client, whether through an HTTP response or an
//! `error` event on the progress stream, are unified under `AppError`. Each
//! variant self-describes how it should be presented via `ErrorMetadata`.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like rate limiting
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "ARCHIVE_TOO_LARGE")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Archive too large: {0}")]
    PayloadTooLarge(String),

    #[error("Unsupported archive: {0}")]
    UnsupportedArchive(String),

    #[error("Invalid archive: {0}")]
    InvalidArchive(String),

    #[error("Archive extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Viewer descriptor error: {0}")]
    Descriptor(String),

    #[error("Product record update failed: {0}")]
    RecordUpdateFailed(String),

    #[error("Rate limit exceeded: retry after {retry_after_secs}s (limit {limit})")]
    RateLimited { retry_after_secs: u64, limit: u32 },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("UUID parsing error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Storage(_) => (
            502,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::BadRequest(_) => (
            400,
            "BAD_REQUEST",
            false,
            Some("Check request format and parameters"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the resource ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::PayloadTooLarge(_) => (
            413,
            "ARCHIVE_TOO_LARGE",
            false,
            Some("Reduce the archive size or split the tile set"),
            false,
            LogLevel::Debug,
        ),
        AppError::UnsupportedArchive(_) => (
            415,
            "UNSUPPORTED_ARCHIVE",
            false,
            Some("Upload a .zip archive exported from KeyShot XR"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidArchive(_) => (
            422,
            "INVALID_ARCHIVE",
            false,
            Some("Re-export the archive and upload it again"),
            false,
            LogLevel::Debug,
        ),
        AppError::ExtractionFailed(_) => (
            422,
            "EXTRACTION_FAILED",
            false,
            Some("Re-export the archive and upload it again"),
            false,
            LogLevel::Warn,
        ),
        AppError::Descriptor(_) => (
            422,
            "DESCRIPTOR_INVALID",
            false,
            Some("Make sure the archive contains exactly one viewer HTML file and its image tiles"),
            false,
            LogLevel::Debug,
        ),
        AppError::RecordUpdateFailed(_) => (
            500,
            "RECORD_UPDATE_FAILED",
            true,
            Some("Upload the archive again; already uploaded tiles will be overwritten"),
            true,
            LogLevel::Error,
        ),
        AppError::RateLimited { .. } => (
            429,
            "RATE_LIMITED",
            true,
            Some("Wait for the rate limit window to reset and retry"),
            false,
            LogLevel::Warn,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Storage(_) => "Storage",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::BadRequest(_) => "BadRequest",
            AppError::NotFound(_) => "NotFound",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::UnsupportedArchive(_) => "UnsupportedArchive",
            AppError::InvalidArchive(_) => "InvalidArchive",
            AppError::ExtractionFailed(_) => "ExtractionFailed",
            AppError::Descriptor(_) => "Descriptor",
            AppError::RecordUpdateFailed(_) => "RecordUpdateFailed",
            AppError::RateLimited { .. } => "RateLimited",
            AppError::Internal(_) | AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access product store".to_string(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::RecordUpdateFailed(_) => {
                "Tiles were uploaded but the product could not be updated".to_string()
            }
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
            AppError::RateLimited {
                retry_after_secs, ..
            } => format!(
                "Too many uploads. Please retry in {} seconds.",
                retry_after_secs
            ),
            AppError::InvalidInput(ref msg)
            | AppError::BadRequest(ref msg)
            | AppError::NotFound(ref msg)
            | AppError::PayloadTooLarge(ref msg)
            | AppError::UnsupportedArchive(ref msg)
            | AppError::InvalidArchive(ref msg)
            | AppError::ExtractionFailed(ref msg)
            | AppError::Descriptor(ref msg) => msg.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_rate_limited() {
        let err = AppError::RateLimited {
            retry_after_secs: 42,
            limit: 10,
        };
        assert_eq!(err.http_status_code(), 429);
        assert_eq!(err.error_code(), "RATE_LIMITED");
        assert!(err.is_recoverable());
        assert!(err.client_message().contains("42"));
        assert_eq!(err.log_level(), LogLevel::Warn);
    }

    #[test]
    fn test_error_metadata_payload_too_large() {
        let err = AppError::PayloadTooLarge("Archive exceeds 100 MB".to_string());
        assert_eq!(err.http_status_code(), 413);
        assert_eq!(err.error_code(), "ARCHIVE_TOO_LARGE");
        assert!(!err.is_recoverable());
        assert_eq!(err.client_message(), "Archive exceeds 100 MB");
        assert!(!err.is_sensitive());
    }

    #[test]
    fn test_error_metadata_record_update_hides_details() {
        let err = AppError::RecordUpdateFailed("connection reset by peer".to_string());
        assert_eq!(err.http_status_code(), 500);
        assert!(err.is_sensitive());
        assert!(!err.client_message().contains("connection reset"));
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_detailed_message_includes_source_chain() {
        let err = AppError::from(anyhow::anyhow!("inner failure").context("outer context"));
        let details = err.detailed_message();
        assert!(details.contains("Internal error with source"));
        assert!(details.contains("Caused by"));
    }
}
