//! Product record access for the ingestion pipeline
//!
//! The pipeline only ever writes one thing to the relational store: the asset
//! fields of an existing product once its tiles are uploaded. That contract is
//! the `ProductRecordStore` trait; `PgProductRepository` backs it with Postgres
//! and `InMemoryProductStore` backs it in development and tests.

pub mod memory;
pub mod product;

pub use memory::{InMemoryProductStore, StoredProduct};
pub use product::{PgProductRepository, ProductRecordStore, RecordError};
