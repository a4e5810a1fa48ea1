//! Pre-extraction archive checks
//!
//! Checks run in a fixed order so the reported error is predictable:
//! size, extension, signature, structure. Nothing here touches the
//! filesystem or decompresses entry data.

use super::ArchiveFormat;
use std::io::Cursor;
use xrdeck_core::IngestSettings;
use zip::ZipArchive;

/// Limits applied to one archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveLimits {
    pub max_bytes: usize,
    pub max_entries: usize,
    pub max_uncompressed_bytes: u64,
    pub allow_rar: bool,
}

impl Default for ArchiveLimits {
    fn default() -> Self {
        Self::from(&IngestSettings::default())
    }
}

impl From<&IngestSettings> for ArchiveLimits {
    fn from(settings: &IngestSettings) -> Self {
        Self {
            max_bytes: settings.max_archive_bytes,
            max_entries: settings.max_entries,
            max_uncompressed_bytes: settings.max_uncompressed_bytes,
            allow_rar: settings.allow_rar,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Archive is {size} bytes, the limit is {max} bytes")]
    TooLarge { size: usize, max: usize },

    #[error("Unsupported archive type '{0}', expected a .zip archive")]
    UnsupportedExtension(String),

    #[error("File content does not match a {expected} archive")]
    CorruptOrSpoofed { expected: ArchiveFormat },

    #[error("Archive has {count} entries, the limit is {max}")]
    TooManyEntries { count: usize, max: usize },

    #[error("Archive expands to {size} bytes, the limit is {max} bytes")]
    ArchiveTooExpanded { size: u64, max: u64 },

    #[error("Archive is empty")]
    Empty,
}

/// Validate raw archive bytes against `limits`, returning the detected format.
pub fn validate_archive(
    data: &[u8],
    filename: &str,
    limits: &ArchiveLimits,
) -> Result<ArchiveFormat, ValidationError> {
    // Size
    if data.is_empty() {
        return Err(ValidationError::Empty);
    }
    if data.len() > limits.max_bytes {
        return Err(ValidationError::TooLarge {
            size: data.len(),
            max: limits.max_bytes,
        });
    }

    // Extension
    let format = match ArchiveFormat::from_filename(filename) {
        Some(ArchiveFormat::Rar) if !limits.allow_rar => {
            return Err(ValidationError::UnsupportedExtension("rar".to_string()));
        }
        Some(format) => format,
        None => {
            let ext = std::path::Path::new(filename)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_string();
            return Err(ValidationError::UnsupportedExtension(ext));
        }
    };

    // Signature
    if !format.matches_signature(data) {
        return Err(ValidationError::CorruptOrSpoofed { expected: format });
    }

    // Structure. RAR headers can only be walked from a file, so the extractor
    // enforces the entry ceiling for that format.
    if format == ArchiveFormat::Zip {
        check_zip_structure(data, limits)?;
    }

    Ok(format)
}

fn check_zip_structure(data: &[u8], limits: &ArchiveLimits) -> Result<(), ValidationError> {
    let mut archive = ZipArchive::new(Cursor::new(data)).map_err(|e| {
        tracing::debug!(error = %e, "Zip central directory unreadable");
        ValidationError::CorruptOrSpoofed {
            expected: ArchiveFormat::Zip,
        }
    })?;

    let count = archive.len();
    if count > limits.max_entries {
        return Err(ValidationError::TooManyEntries {
            count,
            max: limits.max_entries,
        });
    }

    let mut files = 0usize;
    let mut declared_size = 0u64;
    for i in 0..count {
        let entry = archive
            .by_index_raw(i)
            .map_err(|_| ValidationError::CorruptOrSpoofed {
                expected: ArchiveFormat::Zip,
            })?;
        if entry.is_dir() {
            continue;
        }
        files += 1;
        declared_size = declared_size.saturating_add(entry.size());
        if declared_size > limits.max_uncompressed_bytes {
            return Err(ValidationError::ArchiveTooExpanded {
                size: declared_size,
                max: limits.max_uncompressed_bytes,
            });
        }
    }

    if files == 0 {
        return Err(ValidationError::Empty);
    }

    Ok(())
}
