//! Test helpers for ingestion tests
//!
//! Mock implementations of storage and the product record store plus archive
//! fixtures, so the pipeline can be exercised without S3 or PostgreSQL.

pub mod fixtures;
pub mod mock_products;
pub mod mock_storage;

pub use fixtures::*;
pub use mock_products::MockProductStore;
pub use mock_storage::MockStorage;
