//! Image optimization
//!
//! PNG and JPEG files are re-encoded with the `image` crate, SVG files are
//! rewritten by usvg. The optimized bytes are only used when they are smaller
//! than the original.

use crate::assets::files::{copy_file, write_file};
use crate::config::BuildMode;
use anyhow::{Context as _, Result};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageFormat};
use std::fs;
use std::path::Path;

/// Image formats the optimizer distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
    Svg,
    Gif,
    Other,
}

impl ImageKind {
    /// Detect the kind from the file extension, ignoring case
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("png") => ImageKind::Png,
            Some("jpg") | Some("jpeg") => ImageKind::Jpeg,
            Some("svg") => ImageKind::Svg,
            Some("gif") => ImageKind::Gif,
            _ => ImageKind::Other,
        }
    }
}

/// Write one image to its destination for the given build mode
pub fn process_image(source: &Path, dest: &Path, mode: BuildMode, jpeg_quality: u8) -> Result<()> {
    if !mode.is_production() {
        return copy_file(source, dest);
    }

    let original =
        fs::read(source).with_context(|| format!("Failed to read {}", source.display()))?;
    let optimized = optimize(&original, ImageKind::from_path(source), jpeg_quality)
        .with_context(|| format!("Failed to optimize {}", source.display()))?;
    write_file(dest, optimized)
}

/// Optimize image bytes, returning the original when nothing smaller results
pub fn optimize(original: &[u8], kind: ImageKind, jpeg_quality: u8) -> Result<Vec<u8>> {
    let candidate = match kind {
        ImageKind::Png => Some(encode_png(original)?),
        ImageKind::Jpeg => Some(encode_jpeg(original, jpeg_quality)?),
        ImageKind::Svg => optimize_svg(original)?,
        ImageKind::Gif | ImageKind::Other => None,
    };

    Ok(match candidate {
        Some(bytes) if bytes.len() < original.len() => bytes,
        _ => original.to_vec(),
    })
}

fn encode_png(original: &[u8]) -> Result<Vec<u8>> {
    let image = image::load_from_memory_with_format(original, ImageFormat::Png)
        .context("Failed to decode PNG")?;
    let mut out = Vec::new();
    let encoder =
        PngEncoder::new_with_quality(&mut out, CompressionType::Best, FilterType::Adaptive);
    image
        .write_with_encoder(encoder)
        .context("Failed to encode PNG")?;
    Ok(out)
}

fn encode_jpeg(original: &[u8], quality: u8) -> Result<Vec<u8>> {
    let image = image::load_from_memory_with_format(original, ImageFormat::Jpeg)
        .context("Failed to decode JPEG")?;
    // JPEG has no alpha channel
    let image = match image {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => image,
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    };
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, quality);
    image
        .write_with_encoder(encoder)
        .context("Failed to encode JPEG")?;
    Ok(out)
}

/// Rewrite an SVG through usvg; documents with text are left alone
fn optimize_svg(original: &[u8]) -> Result<Option<Vec<u8>>> {
    let text = String::from_utf8_lossy(original);
    if text.contains("<text") {
        return Ok(None);
    }

    let tree = usvg::Tree::from_data(original, &usvg::Options::default())
        .context("Failed to parse SVG")?;
    let write_options = usvg::WriteOptions {
        indent: usvg::Indent::None,
        ..Default::default()
    };
    Ok(Some(tree.to_string(&write_options).into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageEncoder, Rgb, Rgba};
    use tempfile::TempDir;

    fn loose_png() -> Vec<u8> {
        let image = ImageBuffer::from_fn(64, 64, |x, _| Rgba([(x * 4) as u8, 80, 160, 255]));
        let mut out = Vec::new();
        PngEncoder::new_with_quality(&mut out, CompressionType::Fast, FilterType::NoFilter)
            .write_image(image.as_raw(), 64, 64, image::ExtendedColorType::Rgba8)
            .unwrap();
        out
    }

    fn jpeg(quality: u8) -> Vec<u8> {
        let image = ImageBuffer::from_fn(32, 32, |x, y| Rgb([(x * 8) as u8, (y * 8) as u8, 128]));
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, quality)
            .write_image(image.as_raw(), 32, 32, image::ExtendedColorType::Rgb8)
            .unwrap();
        out
    }

    #[test]
    fn test_kind_from_path() {
        assert_eq!(ImageKind::from_path(Path::new("a/logo.PNG")), ImageKind::Png);
        assert_eq!(ImageKind::from_path(Path::new("photo.JPG")), ImageKind::Jpeg);
        assert_eq!(ImageKind::from_path(Path::new("photo.jpeg")), ImageKind::Jpeg);
        assert_eq!(ImageKind::from_path(Path::new("icon.svg")), ImageKind::Svg);
        assert_eq!(ImageKind::from_path(Path::new("anim.gif")), ImageKind::Gif);
        assert_eq!(ImageKind::from_path(Path::new("notes.txt")), ImageKind::Other);
    }

    #[test]
    fn test_png_is_recompressed_losslessly() {
        let original = loose_png();
        let optimized = optimize(&original, ImageKind::Png, 75).unwrap();

        assert!(optimized.len() <= original.len());
        let before = image::load_from_memory(&original).unwrap().to_rgba8();
        let after = image::load_from_memory(&optimized).unwrap().to_rgba8();
        assert_eq!(before, after);
    }

    #[test]
    fn test_jpeg_is_never_larger() {
        let original = jpeg(100);
        let optimized = optimize(&original, ImageKind::Jpeg, 75).unwrap();

        assert!(optimized.len() <= original.len());
        let decoded = image::load_from_memory(&optimized).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 32));
    }

    #[test]
    fn test_svg_is_minified() {
        let original = br##"<?xml version="1.0"?>
<!-- exported by an editor -->
<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10" viewBox="0 0 10 10">
    <g>
        <rect x="0" y="0" width="10" height="10" fill="#ff0000"/>
    </g>
</svg>
"##;
        let optimized = optimize(original, ImageKind::Svg, 75).unwrap();

        assert!(optimized.len() < original.len());
        let text = String::from_utf8(optimized).unwrap();
        assert!(text.starts_with("<svg"));
        assert!(!text.contains("exported by an editor"));
    }

    #[test]
    fn test_svg_with_text_is_kept() {
        let original =
            br#"<svg xmlns="http://www.w3.org/2000/svg"><text x="0" y="10">Hi</text></svg>"#;
        assert_eq!(optimize(original, ImageKind::Svg, 75).unwrap(), original.to_vec());
    }

    #[test]
    fn test_gif_is_copied() {
        let original = b"GIF89a not really a gif";
        assert_eq!(optimize(original, ImageKind::Gif, 75).unwrap(), original.to_vec());
    }

    #[test]
    fn test_corrupt_png_fails() {
        assert!(optimize(b"definitely not a png", ImageKind::Png, 75).is_err());
    }

    #[test]
    fn test_development_copies_bytes() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("src/images/logo.png");
        let dest = dir.path().join("dist/images/logo.png");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, loose_png()).unwrap();

        process_image(&source, &dest, BuildMode::Development, 75).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), fs::read(&source).unwrap());
    }
}
