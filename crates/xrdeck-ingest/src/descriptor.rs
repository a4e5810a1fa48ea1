//! Viewer descriptor parsing and entry classification
//!
//! A KeyShot XR export ships one HTML page that declares the viewer's settings
//! as `var NAME = VALUE;` statements, a folder of numbered tiles, and a few
//! interface graphics. The scan here is deliberately loose: anything that does
//! not look like a simple declaration is skipped.

use crate::archive::ExtractedEntries;
use bytes::Bytes;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;
use xrdeck_core::{DescriptorValue, ViewerDescriptor};

const DESCRIPTOR_EXTENSIONS: &[&str] = &["html", "htm"];
const TILE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Descriptor pages that are never the viewer itself.
const DENIED_DESCRIPTOR_STEMS: &[&str] = &["instructions", "instruction", "help"];

/// Interface graphics shipped next to the tiles.
const DENIED_ASSET_STEMS: &[&str] = &[
    "fixedsizeicon",
    "fullscreenicon",
    "loadingicon",
    "loading",
    "logo",
    "ks_logo",
    "keyshotlogo",
    "cursor",
    "hand",
    "handcursor",
    "hand_cursor",
    "handopen",
    "handclosed",
    "grab",
    "grabbing",
];

static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bvar\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*=\s*([^;]*?)\s*;").expect("valid regex")
});

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("No viewer HTML file found in archive")]
    NoDescriptorFound,

    #[error("Archive contains several viewer HTML files: {}", .0.join(", "))]
    AmbiguousDescriptor(Vec<String>),

    #[error("Archive contains no image tiles")]
    NoTiles,
}

/// Result of classifying an extracted archive
#[derive(Debug, Clone)]
pub struct ParsedArchive {
    pub descriptor: ViewerDescriptor,
    /// Basename of the HTML file the descriptor came from
    pub descriptor_file: String,
    /// Image tiles keyed by original basename
    pub tiles: BTreeMap<String, Bytes>,
    /// Entries that were neither the descriptor nor a tile
    pub discarded: Vec<String>,
}

fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn stem_of(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
        .to_ascii_lowercase()
}

fn is_descriptor_candidate(name: &str) -> bool {
    extension_of(name).is_some_and(|ext| DESCRIPTOR_EXTENSIONS.contains(&ext.as_str()))
        && !DENIED_DESCRIPTOR_STEMS.contains(&stem_of(name).as_str())
}

fn is_denied_asset(name: &str) -> bool {
    let stem = stem_of(name);
    DENIED_ASSET_STEMS.contains(&stem.as_str()) || DENIED_DESCRIPTOR_STEMS.contains(&stem.as_str())
}

fn is_tile(name: &str) -> bool {
    extension_of(name).is_some_and(|ext| TILE_EXTENSIONS.contains(&ext.as_str()))
        && !is_denied_asset(name)
}

/// Turn one right-hand side into a typed value.
fn parse_value(raw: &str) -> DescriptorValue {
    let raw = raw.trim();

    for quote in ['"', '\''] {
        if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
            return DescriptorValue::Text(raw[1..raw.len() - 1].to_string());
        }
    }

    match raw {
        "true" => return DescriptorValue::Bool(true),
        "false" => return DescriptorValue::Bool(false),
        _ => {}
    }

    if raw.starts_with('{') && raw.ends_with('}') && raw[1..raw.len() - 1].trim().is_empty() {
        return DescriptorValue::EmptyObject;
    }

    // `f64::from_str` also accepts "inf" and "NaN", which are identifiers here.
    let looks_numeric = raw
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'));
    if looks_numeric {
        if let Ok(n) = raw.parse::<f64>() {
            if n.is_finite() {
                return DescriptorValue::Number(n);
            }
        }
    }

    DescriptorValue::Text(raw.to_string())
}

/// Collect every `var NAME = VALUE;` declaration in `text`.
pub fn parse_declarations(text: &str) -> ViewerDescriptor {
    let mut descriptor = ViewerDescriptor::new();
    for line in text.lines() {
        for caps in DECLARATION.captures_iter(line) {
            let (Some(name), Some(value)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            if value.as_str().is_empty() {
                continue;
            }
            descriptor.insert(name.as_str(), parse_value(value.as_str()));
        }
    }
    descriptor
}

/// Locate the descriptor, parse it, and split the remaining entries into tiles
/// and discarded assets.
pub fn parse_archive(entries: &ExtractedEntries) -> Result<ParsedArchive, DescriptorError> {
    let candidates: Vec<&String> = entries
        .keys()
        .filter(|name| is_descriptor_candidate(name))
        .collect();

    let descriptor_file = match candidates.as_slice() {
        [] => return Err(DescriptorError::NoDescriptorFound),
        [only] => (*only).clone(),
        many => {
            return Err(DescriptorError::AmbiguousDescriptor(
                many.iter().map(|s| s.to_string()).collect(),
            ))
        }
    };

    let text = String::from_utf8_lossy(&entries[&descriptor_file]);
    let descriptor = parse_declarations(&text);

    let mut tiles = BTreeMap::new();
    let mut discarded = Vec::new();
    for (name, data) in entries {
        if *name == descriptor_file {
            continue;
        }
        if is_tile(name) {
            tiles.insert(name.clone(), data.clone());
        } else {
            discarded.push(name.clone());
        }
    }

    if tiles.is_empty() {
        return Err(DescriptorError::NoTiles);
    }

    tracing::debug!(
        descriptor = %descriptor_file,
        declarations = descriptor.len(),
        tiles = tiles.len(),
        discarded = discarded.len(),
        "Archive classified"
    );

    Ok(ParsedArchive {
        descriptor,
        descriptor_file,
        tiles,
        discarded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::keyshot_descriptor;

    fn entries(items: &[(&str, &str)]) -> ExtractedEntries {
        items
            .iter()
            .map(|(name, data)| (name.to_string(), Bytes::copy_from_slice(data.as_bytes())))
            .collect()
    }

    #[test]
    fn test_declaration_pattern_compiles() {
        // Whole match plus name and value.
        assert_eq!(DECLARATION.captures_len(), 3);
    }

    #[test]
    fn test_parse_scalar_kinds() {
        let text = r#"
            <script>
            var uCount = 36;
            var vCount = 2;
            var minZoom = 0.5;
            var rotationDamping = -0.25;
            var uWrap = true;
            var vWrap = false;
            var imageFolder = "images/";
            var backgroundColor = '#FFFFFF';
            var hotspots = {};
            var viewerMode = someIdentifier;
            </script>
        "#;
        let d = parse_declarations(text);

        assert_eq!(d.get("uCount"), Some(&DescriptorValue::Number(36.0)));
        assert_eq!(d.get("minZoom"), Some(&DescriptorValue::Number(0.5)));
        assert_eq!(d.get("rotationDamping"), Some(&DescriptorValue::Number(-0.25)));
        assert_eq!(d.get("uWrap"), Some(&DescriptorValue::Bool(true)));
        assert_eq!(d.get("vWrap"), Some(&DescriptorValue::Bool(false)));
        assert_eq!(
            d.get("imageFolder"),
            Some(&DescriptorValue::Text("images/".to_string()))
        );
        assert_eq!(
            d.get("backgroundColor"),
            Some(&DescriptorValue::Text("#FFFFFF".to_string()))
        );
        assert_eq!(d.get("hotspots"), Some(&DescriptorValue::EmptyObject));
        assert_eq!(
            d.get("viewerMode"),
            Some(&DescriptorValue::Text("someIdentifier".to_string()))
        );
        assert_eq!(d.len(), 10);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let text = "var = 3;\nvar broken 4;\nvar ok = 1;\nvar missingSemicolon = 2\nvar 9bad = 1;\nvar empty = ;";
        let d = parse_declarations(text);

        assert_eq!(d.len(), 1);
        assert_eq!(d.get("ok"), Some(&DescriptorValue::Number(1.0)));
    }

    #[test]
    fn test_several_declarations_on_one_line() {
        let d = parse_declarations("var uCount = 2; var vCount = 3;");
        assert_eq!(d.column_count(), Some(2));
        assert_eq!(d.row_count(), Some(3));
    }

    #[test]
    fn test_identifier_like_numbers_stay_text() {
        let d = parse_declarations("var a = NaN; var b = inf; var c = 1e3;");
        assert_eq!(d.get("a"), Some(&DescriptorValue::Text("NaN".to_string())));
        assert_eq!(d.get("b"), Some(&DescriptorValue::Text("inf".to_string())));
        assert_eq!(d.get("c"), Some(&DescriptorValue::Number(1000.0)));
    }

    #[test]
    fn test_parse_archive_scenario() {
        let html = keyshot_descriptor(2, 2);
        let e = entries(&[
            ("Viewer.html", html.as_str()),
            ("0_0.png", "a"),
            ("0_1.png", "b"),
            ("1_0.png", "c"),
        ]);
        let parsed = parse_archive(&e).unwrap();

        assert_eq!(parsed.descriptor_file, "Viewer.html");
        assert_eq!(parsed.descriptor.column_count(), Some(2));
        assert_eq!(parsed.descriptor.row_count(), Some(2));
        assert_eq!(parsed.tiles.len(), 3);
        assert!(parsed.discarded.is_empty());
    }

    #[test]
    fn test_deny_listed_assets_are_discarded() {
        let e = entries(&[
            ("viewer.html", "var uCount = 1;"),
            ("instructions.html", "<p>drag to rotate</p>"),
            ("0_0.JPG", "tile"),
            ("0_1.jpeg", "tile"),
            ("fixedSizeIcon.png", "icon"),
            ("FullscreenIcon.png", "icon"),
            ("loadingIcon.png", "icon"),
            ("logo.png", "icon"),
            ("hand.png", "icon"),
            ("grabbing.png", "icon"),
            ("style.css", "body{}"),
        ]);
        let parsed = parse_archive(&e).unwrap();

        assert_eq!(
            parsed.tiles.keys().collect::<Vec<_>>(),
            vec!["0_0.JPG", "0_1.jpeg"]
        );
        assert_eq!(parsed.discarded.len(), 8);
        assert!(parsed.discarded.contains(&"instructions.html".to_string()));
    }

    #[test]
    fn test_no_descriptor() {
        let e = entries(&[("instructions.html", "x"), ("0_0.png", "a")]);
        assert_eq!(parse_archive(&e).unwrap_err(), DescriptorError::NoDescriptorFound);
    }

    #[test]
    fn test_ambiguous_descriptor() {
        let e = entries(&[("a.html", "x"), ("b.htm", "y"), ("0_0.png", "a")]);
        assert_eq!(
            parse_archive(&e).unwrap_err(),
            DescriptorError::AmbiguousDescriptor(vec!["a.html".to_string(), "b.htm".to_string()])
        );
    }

    #[test]
    fn test_no_tiles() {
        let e = entries(&[("viewer.html", "var uCount = 1;"), ("logo.png", "x")]);
        assert_eq!(parse_archive(&e).unwrap_err(), DescriptorError::NoTiles);
    }

    #[test]
    fn test_tile_count_matches_non_denied_images() {
        for n in [1usize, 5, 37] {
            let mut items: Vec<(String, String)> = (0..n)
                .map(|i| (format!("0_{i}.png"), "x".to_string()))
                .collect();
            items.push(("viewer.html".to_string(), "var uCount = 1;".to_string()));
            items.push(("logo.png".to_string(), "x".to_string()));
            let e: ExtractedEntries = items
                .into_iter()
                .map(|(k, v)| (k, Bytes::from(v)))
                .collect();

            let parsed = parse_archive(&e).unwrap();
            assert_eq!(parsed.tiles.len(), n);
            assert!(!parsed.descriptor.is_empty());
        }
    }
}
