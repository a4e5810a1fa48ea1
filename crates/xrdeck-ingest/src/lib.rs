//! xrdeck Ingest Library
//!
//! Turns a KeyShot XR export archive into a published product: the archive is
//! validated, extracted in memory, its viewer descriptor parsed, the image
//! tiles uploaded to storage in batches, and the product record updated.

pub mod archive;
pub mod descriptor;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod sort;
pub mod uploader;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use archive::{ArchiveFormat, ArchiveLimits, ExtractionError, ValidationError};
pub use descriptor::{parse_archive, parse_declarations, DescriptorError, ParsedArchive};
pub use error::IngestError;
pub use pipeline::{
    ArchiveSource, IngestOutcome, IngestRequest, IngestState, IngestSummary, IngestionPipeline,
};
pub use progress::{progress_channel, Phase, ProgressDetail, ProgressEvent, ProgressStream};
pub use sort::{natural_cmp, sort_natural};
pub use uploader::{BatchConfig, BatchResult, BatchUploader, FailedUpload, UploadProgress};
