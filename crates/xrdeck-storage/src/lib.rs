//! xrdeck Storage Library
//!
//! Object-storage abstraction used by the ingestion pipeline, with S3 and local
//! filesystem implementations.
//!
//! # Storage key format
//!
//! Product tiles live under `products/{owner_id}/{product_id}/{tile}`. Staged
//! archives (uploaded by the browser ahead of ingestion) live wherever the
//! client put them and are addressed by their raw key.
//!
//! Keys must not contain `..` or a leading `/`. Key generation is centralized in
//! the `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use keys::{tile_key, validate_key};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult, UploadItem};
pub use xrdeck_core::StorageBackend;
