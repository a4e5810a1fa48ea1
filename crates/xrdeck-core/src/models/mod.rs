//! Domain models shared across crates

pub mod descriptor;
pub mod product;

pub use descriptor::{DescriptorValue, ViewerDescriptor};
pub use product::{is_staged_key, product_asset_prefix, staging_prefix, ProductAssetUpdate};
