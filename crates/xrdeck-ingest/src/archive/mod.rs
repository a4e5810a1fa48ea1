//! Archive validation and extraction
//!
//! Archives arrive as raw bytes plus the filename the client declared. The
//! validator decides which container format they are (and whether to trust
//! them at all); the extractor then flattens them into a map of basename to
//! bytes.

pub mod extractor;
pub mod validator;

pub use extractor::{extract_archive, ExtractedEntries, ExtractionError};
pub use validator::{validate_archive, ArchiveLimits, ValidationError};

use std::path::Path;

const ZIP_LOCAL_HEADER: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_ARCHIVE: &[u8] = b"PK\x05\x06";
const RAR_SIGNATURE: &[u8] = b"Rar!\x1A\x07";

/// Supported container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Rar,
}

impl ArchiveFormat {
    /// Format implied by the filename extension, case-insensitive.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())?
            .to_ascii_lowercase();
        match ext.as_str() {
            "zip" => Some(ArchiveFormat::Zip),
            "rar" => Some(ArchiveFormat::Rar),
            _ => None,
        }
    }

    /// Whether `data` starts with one of this format's magic byte sequences.
    pub fn matches_signature(&self, data: &[u8]) -> bool {
        match self {
            ArchiveFormat::Zip => {
                data.starts_with(ZIP_LOCAL_HEADER) || data.starts_with(ZIP_EMPTY_ARCHIVE)
            }
            ArchiveFormat::Rar => data.starts_with(RAR_SIGNATURE),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Rar => "rar",
        }
    }
}

impl std::fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Basename of an archive entry, or `None` for entries that carry no content
/// for the viewer (directories, `__MACOSX` metadata, hidden files).
///
/// Only the final path component survives, so `../../etc/passwd` becomes
/// `passwd`. Both separators are honoured since archives made on Windows use
/// backslashes.
pub fn sanitize_entry_name(raw: &str) -> Option<String> {
    if raw.ends_with('/') || raw.ends_with('\\') {
        return None;
    }
    if raw
        .split(['/', '\\'])
        .any(|segment| segment.eq_ignore_ascii_case("__MACOSX"))
    {
        return None;
    }

    let name = raw.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() || name == "." || name == ".." || name.starts_with('.') {
        return None;
    }
    Some(name.to_string())
}
