//! Snapshot loading and canonical decoding.

use std::path::Path;

use image::imageops::FilterType;
use image::RgbImage;

use crate::config::CANONICAL_EDGE;
use crate::error::{Result, SceneError};

/// Raw bytes of one snapshot plus where they came from.
///
/// Decoding is deferred to the consuming stage, so a corrupt file degrades
/// that stage's signal instead of failing the whole pair at load time. Only
/// a filesystem error aborts the analysis.
#[derive(Debug, Clone)]
pub struct ImageHandle {
    source: String,
    bytes: Vec<u8>,
}

impl ImageHandle {
    /// Read a snapshot from disk. Fails only on filesystem errors.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| SceneError::Input {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(ImageHandle {
            source: path.display().to_string(),
            bytes,
        })
    }

    /// Wrap already-loaded bytes, e.g. an upload buffer.
    pub fn from_bytes(source: impl Into<String>, bytes: Vec<u8>) -> Self {
        ImageHandle {
            source: source.into(),
            bytes,
        }
    }

    /// Where the bytes came from, for diagnostics.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Encoded bytes as read from the source.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Decode to full-resolution RGB.
    pub fn decode_rgb(&self) -> Result<RgbImage> {
        let decoded = image::load_from_memory(&self.bytes).map_err(|e| {
            SceneError::DegradedSignal {
                stage: "decode",
                reason: format!("{}: {}", self.source, e),
            }
        })?;
        Ok(decoded.to_rgb8())
    }

    /// Decode and resize to the canonical comparison grid, making the
    /// pixel metric resolution-invariant.
    pub fn canonical_rgb(&self) -> Result<RgbImage> {
        let decoded = image::load_from_memory(&self.bytes).map_err(|e| {
            SceneError::DegradedSignal {
                stage: "decode",
                reason: format!("{}: {}", self.source, e),
            }
        })?;
        Ok(decoded
            .resize_exact(CANONICAL_EDGE, CANONICAL_EDGE, FilterType::Triangle)
            .to_rgb8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageOutputFormat, Rgb};
    use std::io::Cursor;

    fn png_bytes(color: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(32, 48, Rgb(color));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageOutputFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_load_missing_file_is_input_error() {
        let err = ImageHandle::load(Path::new("/nonexistent/snapshot.png")).unwrap_err();
        match err {
            SceneError::Input { ref path, .. } => {
                assert!(path.contains("/nonexistent/snapshot.png"));
            }
            other => panic!("expected Input error, got {other:?}"),
        }
    }

    #[test]
    fn test_corrupt_bytes_fail_decode_not_load() {
        let handle = ImageHandle::from_bytes("corrupt", vec![0xde, 0xad, 0xbe, 0xef]);
        let err = handle.decode_rgb().unwrap_err();
        assert!(matches!(err, SceneError::DegradedSignal { stage: "decode", .. }));
    }

    #[test]
    fn test_canonical_resize_dimensions() {
        let handle = ImageHandle::from_bytes("fixture", png_bytes([10, 20, 30]));
        let canonical = handle.canonical_rgb().unwrap();
        assert_eq!(canonical.dimensions(), (CANONICAL_EDGE, CANONICAL_EDGE));
    }

    #[test]
    fn test_decode_preserves_resolution() {
        let handle = ImageHandle::from_bytes("fixture", png_bytes([10, 20, 30]));
        let full = handle.decode_rgb().unwrap();
        assert_eq!(full.dimensions(), (32, 48));
    }
}
