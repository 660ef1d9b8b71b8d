//! ==============================================================================
//! imaging.rs - webcam image passthrough
//! ==============================================================================
//!
//! purpose:
//!     serves a webcam jpeg either at full size or scaled to 50% for the
//!     low-bandwidth page. the image is always decoded and re-encoded so a
//!     half-written capture fails here instead of in the browser.
//!
//! security:
//!     the requested name is a bare file name inside the image directory.
//!     separators and parent segments are rejected; that is the only check.
//!
//! ==============================================================================

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader};
use std::path::{Path, PathBuf};

use crate::error::{HostError, Result};

const JPEG_QUALITY: u8 = 100;

/// requested output size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Full,
    /// half width, half height
    Low,
}

impl Resolution {
    /// "l" selects the half-size image, anything else full size
    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag {
            Some("l") => Self::Low,
            _ => Self::Full,
        }
    }
}

/// reject names that could leave `dir`
pub fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(HostError::PathRejected(name.to_string()));
    }
    Ok(())
}

/// `dir/name` after the traversal check, SourceUnavailable if missing
pub fn resolve(dir: &Path, name: &str) -> Result<PathBuf> {
    check_name(name)?;
    let path = dir.join(name);
    if !path.is_file() {
        return Err(HostError::SourceUnavailable(path));
    }
    Ok(path)
}

fn halve(img: &DynamicImage) -> DynamicImage {
    let (width, height) = img.dimensions();
    let new_width = (width / 2).max(1);
    let new_height = (height / 2).max(1);
    img.resize_exact(new_width, new_height, FilterType::Triangle)
}

/// decode `name`, optionally scale it, return jpeg bytes
pub fn render(image_dir: &Path, name: &str, resolution: Resolution) -> Result<Vec<u8>> {
    let path = resolve(image_dir, name)?;
    let img = ImageReader::open(&path)?.with_guessed_format()?.decode()?;

    let img = match resolution {
        Resolution::Low => halve(&img),
        Resolution::Full => img,
    };

    let mut jpeg = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY);
    DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)?;

    tracing::debug!(image = %path.display(), ?resolution, bytes = jpeg.len(), "image rendered");
    Ok(jpeg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn write_jpeg(dir: &Path, name: &str, width: u32, height: u32) {
        let img = RgbImage::from_fn(width, height, |x, y| image::Rgb([x as u8, y as u8, 128]));
        DynamicImage::ImageRgb8(img).save(dir.join(name)).unwrap();
    }

    #[test]
    fn traversal_is_rejected() {
        for name in ["../etc/passwd", "a/b.jpg", "..", "x..jpg", "c:\\x.jpg", ""] {
            assert!(matches!(check_name(name), Err(HostError::PathRejected(_))), "{name}");
        }
        assert!(check_name("current.jpg").is_ok());
    }

    #[test]
    fn low_resolution_halves_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        write_jpeg(dir.path(), "current.jpg", 64, 48);

        let bytes = render(dir.path(), "current.jpg", Resolution::Low).unwrap();
        let out = image::load_from_memory(&bytes).unwrap();
        assert_eq!(out.dimensions(), (32, 24));
    }

    #[test]
    fn full_resolution_keeps_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        write_jpeg(dir.path(), "12.jpg", 40, 30);

        let bytes = render(dir.path(), "12.jpg", Resolution::from_flag(Some("h"))).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(image::load_from_memory(&bytes).unwrap().dimensions(), (40, 30));
    }

    #[test]
    fn tiny_image_never_scales_to_zero() {
        let dir = tempfile::tempdir().unwrap();
        write_jpeg(dir.path(), "dot.jpg", 1, 1);

        let bytes = render(dir.path(), "dot.jpg", Resolution::Low).unwrap();
        assert_eq!(image::load_from_memory(&bytes).unwrap().dimensions(), (1, 1));
    }

    #[test]
    fn missing_and_corrupt_images() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            render(dir.path(), "nope.jpg", Resolution::Full),
            Err(HostError::SourceUnavailable(_))
        ));

        std::fs::write(dir.path().join("torn.jpg"), [0xFF, 0xD8, 0xFF]).unwrap();
        assert!(matches!(
            render(dir.path(), "torn.jpg", Resolution::Full),
            Err(HostError::Image(_))
        ));
    }

    #[test]
    fn resolution_flag() {
        assert_eq!(Resolution::from_flag(Some("l")), Resolution::Low);
        assert_eq!(Resolution::from_flag(Some("h")), Resolution::Full);
        assert_eq!(Resolution::from_flag(None), Resolution::Full);
    }
}
