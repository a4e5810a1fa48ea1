//! Archive extraction into memory
//!
//! Each container format has its own function; [`extract_archive`] dispatches
//! on the format the validator already settled on. Entries are flattened to
//! their basename and byte content is kept exactly as stored.

use super::{sanitize_entry_name, ArchiveFormat, ArchiveLimits};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use zip::ZipArchive;

/// Extracted entries keyed by basename
pub type ExtractedEntries = BTreeMap<String, Bytes>;

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Failed to read zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Failed to read rar archive: {0}")]
    Rar(String),

    #[error("RAR archives are not supported by this build")]
    RarUnsupported,

    #[error("Archive has more than {max} entries")]
    TooManyEntries { max: usize },

    #[error("Archive expands beyond {max} bytes")]
    TooExpanded { max: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Extract every content entry of a validated archive.
///
/// Fails as a whole: no partial entry map is ever returned.
pub fn extract_archive(
    data: &[u8],
    format: ArchiveFormat,
    limits: &ArchiveLimits,
) -> Result<ExtractedEntries, ExtractionError> {
    let start = std::time::Instant::now();
    let entries = match format {
        ArchiveFormat::Zip => extract_zip(data, limits)?,
        ArchiveFormat::Rar => extract_rar(data, limits)?,
    };

    tracing::debug!(
        format = %format,
        entries = entries.len(),
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Archive extracted"
    );
    Ok(entries)
}

/// Tracks the running totals shared by both extractors.
struct EntryBudget<'a> {
    limits: &'a ArchiveLimits,
    seen: usize,
    expanded: u64,
}

impl<'a> EntryBudget<'a> {
    fn new(limits: &'a ArchiveLimits) -> Self {
        Self {
            limits,
            seen: 0,
            expanded: 0,
        }
    }

    fn count_entry(&mut self) -> Result<(), ExtractionError> {
        self.seen += 1;
        if self.seen > self.limits.max_entries {
            return Err(ExtractionError::TooManyEntries {
                max: self.limits.max_entries,
            });
        }
        Ok(())
    }

    /// Bytes still allowed before the expansion ceiling is hit.
    fn remaining(&self) -> u64 {
        self.limits
            .max_uncompressed_bytes
            .saturating_sub(self.expanded)
    }

    fn add_bytes(&mut self, len: usize) -> Result<(), ExtractionError> {
        self.expanded = self.expanded.saturating_add(len as u64);
        if self.expanded > self.limits.max_uncompressed_bytes {
            return Err(ExtractionError::TooExpanded {
                max: self.limits.max_uncompressed_bytes,
            });
        }
        Ok(())
    }
}

fn insert_entry(entries: &mut ExtractedEntries, raw_name: &str, data: Vec<u8>) {
    let Some(name) = sanitize_entry_name(raw_name) else {
        return;
    };
    if entries.contains_key(&name) {
        tracing::warn!(entry = %raw_name, name = %name, "Duplicate basename in archive, keeping first");
        return;
    }
    entries.insert(name, Bytes::from(data));
}

fn extract_zip(data: &[u8], limits: &ArchiveLimits) -> Result<ExtractedEntries, ExtractionError> {
    let mut archive = ZipArchive::new(Cursor::new(data))?;
    let mut budget = EntryBudget::new(limits);
    let mut entries = ExtractedEntries::new();

    for i in 0..archive.len() {
        budget.count_entry()?;
        let file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        let raw_name = file.name().to_string();

        // Declared sizes can lie; cap the actual read one byte past the budget.
        let mut buffer = Vec::with_capacity(file.size().min(budget.remaining()) as usize);
        file.take(budget.remaining().saturating_add(1))
            .read_to_end(&mut buffer)?;
        budget.add_bytes(buffer.len())?;

        insert_entry(&mut entries, &raw_name, buffer);
    }

    Ok(entries)
}

#[cfg(feature = "rar")]
fn extract_rar(data: &[u8], limits: &ArchiveLimits) -> Result<ExtractedEntries, ExtractionError> {
    use std::io::Write;

    // The native decoder only reads from a path.
    let mut staged = tempfile::Builder::new()
        .prefix("xrdeck-")
        .suffix(".rar")
        .tempfile()?;
    staged.write_all(data)?;
    staged.flush()?;

    let mut budget = EntryBudget::new(limits);
    let mut entries = ExtractedEntries::new();

    let mut archive = unrar::Archive::new(staged.path())
        .open_for_processing()
        .map_err(|e| ExtractionError::Rar(e.to_string()))?;

    while let Some(header) = archive
        .read_header()
        .map_err(|e| ExtractionError::Rar(e.to_string()))?
    {
        budget.count_entry()?;
        let entry = header.entry();
        let raw_name = entry.filename.to_string_lossy().into_owned();

        archive = if entry.is_file() {
            if entry.unpacked_size as u64 > budget.remaining() {
                return Err(ExtractionError::TooExpanded {
                    max: limits.max_uncompressed_bytes,
                });
            }
            let (content, rest) = header
                .read()
                .map_err(|e| ExtractionError::Rar(e.to_string()))?;
            budget.add_bytes(content.len())?;
            insert_entry(&mut entries, &raw_name, content);
            rest
        } else {
            header
                .skip()
                .map_err(|e| ExtractionError::Rar(e.to_string()))?
        };
    }

    Ok(entries)
}

#[cfg(not(feature = "rar"))]
fn extract_rar(_data: &[u8], _limits: &ArchiveLimits) -> Result<ExtractedEntries, ExtractionError> {
    Err(ExtractionError::RarUnsupported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{tile_png, xr_export_zip, ZipFixture, XR_EXPORT_DESCRIPTOR, XR_EXPORT_RAR};

    #[test]
    fn test_extract_flattens_to_basename() {
        let data = ZipFixture::new()
            .dir("export/")
            .file("export/viewer.html", "var uCount = 2;")
            .file("export/images/0_0.png", [0x89, b'P', b'N', b'G'])
            .build();

        let entries = extract_archive(&data, ArchiveFormat::Zip, &ArchiveLimits::default()).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries["viewer.html"], Bytes::from_static(b"var uCount = 2;"));
        assert_eq!(entries["0_0.png"], Bytes::from_static(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn test_extract_ignores_traversal_and_metadata() {
        let data = ZipFixture::new()
            .file("../../evil.png", "x")
            .file("__MACOSX/._0_0.png", "meta")
            .file(".DS_Store", "meta")
            .build();

        let entries = extract_archive(&data, ArchiveFormat::Zip, &ArchiveLimits::default()).unwrap();

        assert_eq!(entries.keys().collect::<Vec<_>>(), vec!["evil.png"]);
    }

    #[test]
    fn test_duplicate_basename_keeps_first() {
        let data = ZipFixture::new()
            .file("a/0_0.png", "first")
            .file("b/0_0.png", "second")
            .build();

        let entries = extract_archive(&data, ArchiveFormat::Zip, &ArchiveLimits::default()).unwrap();
        assert_eq!(entries["0_0.png"], Bytes::from_static(b"first"));
    }

    #[test]
    fn test_actual_expansion_is_capped() {
        let limits = ArchiveLimits {
            max_uncompressed_bytes: 100,
            ..ArchiveLimits::default()
        };
        let data = ZipFixture::new().file("0_0.png", vec![7u8; 500]).build();

        let result = extract_archive(&data, ArchiveFormat::Zip, &limits);
        assert!(matches!(result, Err(ExtractionError::TooExpanded { max: 100 })));
    }

    #[test]
    fn test_corrupt_zip_fails_whole_extraction() {
        let result = extract_archive(b"PK\x03\x04garbage", ArchiveFormat::Zip, &ArchiveLimits::default());
        assert!(matches!(result, Err(ExtractionError::Zip(_))));
    }

    #[cfg(feature = "rar")]
    #[test]
    fn test_rar_matches_zip_equivalent() {
        let limits = ArchiveLimits::default();
        let from_rar = extract_archive(XR_EXPORT_RAR, ArchiveFormat::Rar, &limits).unwrap();
        let from_zip = extract_archive(&xr_export_zip(), ArchiveFormat::Zip, &limits).unwrap();

        assert_eq!(
            from_rar.keys().collect::<Vec<_>>(),
            vec!["0_0.png", "0_1.png", "1_0.png", "viewer.html"]
        );
        assert_eq!(from_rar, from_zip);
        assert_eq!(from_rar["viewer.html"], Bytes::from_static(XR_EXPORT_DESCRIPTOR.as_bytes()));
        assert_eq!(from_rar["0_1.png"], Bytes::from(tile_png(2)));
    }

    #[cfg(feature = "rar")]
    #[test]
    fn test_rar_entry_ceiling_counts_every_header() {
        // Two directories, the descriptor and three tiles.
        let exact = ArchiveLimits {
            max_entries: 6,
            ..ArchiveLimits::default()
        };
        assert!(extract_archive(XR_EXPORT_RAR, ArchiveFormat::Rar, &exact).is_ok());

        let limits = ArchiveLimits {
            max_entries: 3,
            ..ArchiveLimits::default()
        };
        let result = extract_archive(XR_EXPORT_RAR, ArchiveFormat::Rar, &limits);
        assert!(matches!(result, Err(ExtractionError::TooManyEntries { max: 3 })));
    }

    #[cfg(feature = "rar")]
    #[test]
    fn test_rar_unpacked_size_budget() {
        // Room for the descriptor but not the first tile.
        let limits = ArchiveLimits {
            max_uncompressed_bytes: 300,
            ..ArchiveLimits::default()
        };
        let result = extract_archive(XR_EXPORT_RAR, ArchiveFormat::Rar, &limits);
        assert!(matches!(result, Err(ExtractionError::TooExpanded { max: 300 })));
    }

    #[cfg(feature = "rar")]
    #[test]
    fn test_corrupt_rar_fails() {
        let result = extract_archive(
            b"Rar!\x1A\x07\x01\x00not-really-rar",
            ArchiveFormat::Rar,
            &ArchiveLimits::default(),
        );
        assert!(matches!(result, Err(ExtractionError::Rar(_))));
    }
}
