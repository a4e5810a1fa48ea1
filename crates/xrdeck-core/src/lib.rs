//! xrdeck Core Library
//!
//! This crate provides the configuration, error types and domain models that are
//! shared by the storage, database, ingestion and API crates.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{BaseConfig, Config, IngestSettings, ServiceConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    is_staged_key, product_asset_prefix, staging_prefix, DescriptorValue, ProductAssetUpdate,
    ViewerDescriptor,
};
pub use storage_types::StorageBackend;
