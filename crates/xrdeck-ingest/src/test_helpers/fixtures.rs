//! Archive fixtures shaped like KeyShot XR exports

use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// PNG signature followed by filler, enough for content-type and size checks.
pub fn tile_png(seed: u8) -> Vec<u8> {
    let mut data = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    data.extend(std::iter::repeat(seed).take(256));
    data
}

/// Builder for in-memory ZIP archives.
#[derive(Default)]
pub struct ZipFixture {
    entries: Vec<(String, Option<Vec<u8>>)>,
}

impl ZipFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, name: &str, data: impl AsRef<[u8]>) -> Self {
        self.entries
            .push((name.to_string(), Some(data.as_ref().to_vec())));
        self
    }

    pub fn dir(mut self, name: &str) -> Self {
        self.entries.push((name.to_string(), None));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, data) in self.entries {
            match data {
                Some(data) => {
                    writer.start_file(name, options).unwrap();
                    writer.write_all(&data).unwrap();
                }
                None => writer.add_directory(name, options).unwrap(),
            }
        }
        writer.finish().unwrap().into_inner()
    }
}

/// Viewer page declaring a `columns` x `rows` tile grid.
pub fn keyshot_descriptor(columns: u32, rows: u32) -> String {
    format!(
        r##"<!DOCTYPE html>
<html>
<head>
<title>KeyShot XR</title>
<script type="text/javascript">
    var nameOfDiv = "KeyShotXR";
    var folderName = "images";
    var viewPortWidth = 1024;
    var viewPortHeight = 768;
    var backgroundColor = "#FFFFFF";
    var uCount = {columns};
    var vCount = {rows};
    var uWrap = true;
    var vWrap = false;
    var uMouseSensitivity = -0.1;
    var vMouseSensitivity = 1;
    var uStartIndex = 0;
    var vStartIndex = 0;
    var minZoom = 1;
    var maxZoom = 1;
    var rotationDamping = 0.96;
    var downScaleToBrowser = true;
    var addDownScaleGUIButton = false;
    var downloadOnInteraction = false;
    var imageExtension = "png";
    var showLoading = true;
    var loadingIcon = "ks_logo.png";
    var allowFullscreen = true;
    var uReverse = false;
    var vReverse = false;
    var hotspots = {{}};
    var isIBooksWidget = false;
</script>
</head>
<body></body>
</html>
"##
    )
}

/// Full export: descriptor, a `rows` x `columns` grid of tiles and the
/// interface graphics KeyShot ships next to them.
pub fn keyshot_archive(rows: u32, columns: u32) -> Vec<u8> {
    let mut fixture = ZipFixture::new()
        .dir("KeyShotXR/")
        .file(
            "KeyShotXR/KeyShotXR.html",
            keyshot_descriptor(columns, rows),
        )
        .file("KeyShotXR/files/ks_logo.png", tile_png(0xFF))
        .file("KeyShotXR/files/hand.png", tile_png(0xFE))
        .file("__MACOSX/KeyShotXR/._KeyShotXR.html", b"resource fork");
    for row in 0..rows {
        for col in 0..columns {
            fixture = fixture.file(
                &format!("KeyShotXR/images/{}_{}.png", row, col),
                tile_png((row * columns + col) as u8),
            );
        }
    }
    fixture.build()
}

/// Descriptor for a 2 x 2 grid that only ships three tiles.
pub fn scenario_b_archive() -> Vec<u8> {
    ZipFixture::new()
        .file("viewer.html", keyshot_descriptor(2, 2))
        .file("1_0.png", tile_png(3))
        .file("0_1.png", tile_png(2))
        .file("0_0.png", tile_png(1))
        .build()
}

/// Descriptor stored in [`XR_EXPORT_RAR`].
pub const XR_EXPORT_DESCRIPTOR: &str =
    "<script>\nvar uCount = 2;\nvar vCount = 2;\nvar uWrap = true;\n</script>\n";

/// Stored-method RAR 4 export with six headers: directories `KeyShotXR` and
/// `KeyShotXR\images`, `KeyShotXR\viewer.html` holding
/// [`XR_EXPORT_DESCRIPTOR`], and tiles `0_0`, `0_1`, `1_0` made by
/// [`tile_png`] with seeds 1 to 3.
pub const XR_EXPORT_RAR: &[u8] = include_bytes!("data/xr_export.rar");

/// [`XR_EXPORT_RAR`] repacked as a ZIP.
pub fn xr_export_zip() -> Vec<u8> {
    ZipFixture::new()
        .dir("KeyShotXR/")
        .file("KeyShotXR/viewer.html", XR_EXPORT_DESCRIPTOR)
        .dir("KeyShotXR/images/")
        .file("KeyShotXR/images/0_0.png", tile_png(1))
        .file("KeyShotXR/images/0_1.png", tile_png(2))
        .file("KeyShotXR/images/1_0.png", tile_png(3))
        .build()
}
