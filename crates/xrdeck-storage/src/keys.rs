//! Shared key generation for storage backends.
//!
//! Tile keys: `{prefix}/{filename}` where the prefix is the product asset path.

use crate::traits::{StorageError, StorageResult};

/// Reject keys that could escape the bucket root or a local base directory.
pub fn validate_key(storage_key: &str) -> StorageResult<()> {
    if storage_key.is_empty()
        || storage_key.starts_with('/')
        || storage_key.contains('\\')
        || storage_key.split('/').any(|segment| segment == "..")
    {
        return Err(StorageError::InvalidKey(format!(
            "Storage key contains invalid characters: {}",
            storage_key
        )));
    }
    Ok(())
}

/// Build the storage key for one tile under a destination prefix.
pub fn tile_key(prefix: &str, filename: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_key_joins_prefix() {
        assert_eq!(tile_key("products/a/b", "0_0.png"), "products/a/b/0_0.png");
        assert_eq!(tile_key("products/a/b/", "0_0.png"), "products/a/b/0_0.png");
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("products/a/b/0_0.png").is_ok());
        assert!(validate_key("uploads/..hidden.zip").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("products/../../etc/passwd").is_err());
        assert!(validate_key("products\\evil").is_err());
    }
}
