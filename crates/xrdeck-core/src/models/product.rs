use serde::Serialize;
use uuid::Uuid;

/// Fields written to a product record once its tile set has been ingested.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductAssetUpdate {
    /// Viewer descriptor, stored as opaque JSON.
    pub config: serde_json::Value,
    /// Storage prefix the tiles were uploaded under.
    pub path: String,
    /// Total tile size in MB.
    pub weight: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
}

/// Storage prefix for a product's tiles: `products/{owner_id}/{product_id}`.
pub fn product_asset_prefix(owner_id: Uuid, product_id: Uuid) -> String {
    format!("products/{}/{}", owner_id, product_id)
}

/// Prefix a client stages archives under: `staging/{owner_id}`.
pub fn staging_prefix(owner_id: Uuid) -> String {
    format!("staging/{}", owner_id)
}

/// Whether `key` names an object inside the owner's staging prefix.
///
/// Anything else (other owners, published tiles, `..` or empty segments) is
/// refused, since staged archives are deleted once ingested.
pub fn is_staged_key(owner_id: Uuid, key: &str) -> bool {
    let prefix = staging_prefix(owner_id);
    let Some(rest) = key
        .strip_prefix(prefix.as_str())
        .and_then(|rest| rest.strip_prefix('/'))
    else {
        return false;
    };
    !rest.is_empty()
        && rest
            .split(['/', '\\'])
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_asset_prefix() {
        let owner = Uuid::nil();
        let product = Uuid::from_u128(1);
        assert_eq!(
            product_asset_prefix(owner, product),
            format!("products/{}/{}", owner, product)
        );
    }

    #[test]
    fn test_staged_key_must_sit_under_owner_prefix() {
        let owner = Uuid::from_u128(7);
        let other = Uuid::from_u128(8);
        let prefix = staging_prefix(owner);

        assert!(is_staged_key(owner, &format!("{prefix}/export.zip")));
        assert!(is_staged_key(owner, &format!("{prefix}/2024/export.zip")));

        assert!(!is_staged_key(owner, &format!("{}/export.zip", staging_prefix(other))));
        assert!(!is_staged_key(owner, &format!("{}/0_0.png", product_asset_prefix(other, owner))));
        assert!(!is_staged_key(owner, &prefix));
        assert!(!is_staged_key(owner, &format!("{prefix}/")));
        assert!(!is_staged_key(owner, &format!("{prefix}export.zip")));
        assert!(!is_staged_key(owner, &format!("{prefix}/../../products/x/0_0.png")));
        assert!(!is_staged_key(owner, &format!("{prefix}//export.zip")));
        assert!(!is_staged_key(owner, &format!("/{prefix}/export.zip")));
    }

    #[test]
    fn test_update_skips_missing_cover() {
        let update = ProductAssetUpdate {
            config: serde_json::json!({}),
            path: "products/a/b".to_string(),
            weight: 1.5,
            cover_image: None,
        };
        let json = serde_json::to_value(&update).unwrap();
        assert!(json.get("coverImage").is_none());
        assert_eq!(json["weight"], 1.5);
    }
}
