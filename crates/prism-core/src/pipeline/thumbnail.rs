//! Bounded-box thumbnail generation with JPEG output.

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::io::Cursor;
use std::path::Path;

use crate::config::ThumbnailConfig;
use crate::error::PipelineError;
use crate::types::ThumbnailSize;

/// Generates the small and medium thumbnails from a normalized image.
pub struct ThumbnailGenerator {
    config: ThumbnailConfig,
}

impl ThumbnailGenerator {
    /// Create a new thumbnail generator with the given configuration.
    pub fn new(config: ThumbnailConfig) -> Self {
        Self { config }
    }

    /// Bounding box edge for a thumbnail variant.
    pub fn bound(&self, size: ThumbnailSize) -> u32 {
        match size {
            ThumbnailSize::Small => self.config.small_size,
            ThumbnailSize::Medium => self.config.medium_size,
        }
    }

    /// Fit the image inside the variant's box, preserving aspect ratio.
    /// Images already inside the box are returned unscaled.
    pub fn render(&self, image: &DynamicImage, size: ThumbnailSize) -> DynamicImage {
        let bound = self.bound(size);
        if image.width() <= bound && image.height() <= bound {
            image.clone()
        } else {
            image.thumbnail(bound, bound)
        }
    }

    /// Render a variant and encode it as JPEG bytes.
    pub fn generate_bytes(
        &self,
        image: &DynamicImage,
        size: ThumbnailSize,
        path: &Path,
    ) -> Result<Vec<u8>, PipelineError> {
        let thumbnail = self.render(image, size);
        encode_jpeg(&thumbnail, self.config.quality, path)
    }
}

/// Encode an image as baseline JPEG at the given quality.
///
/// `path` is only used for error context.
pub fn encode_jpeg(image: &DynamicImage, quality: u8, path: &Path) -> Result<Vec<u8>, PipelineError> {
    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    image
        .write_with_encoder(encoder)
        .map_err(|e| PipelineError::Encode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    fn generator() -> ThumbnailGenerator {
        ThumbnailGenerator::new(ThumbnailConfig::default())
    }

    #[test]
    fn test_render_preserves_aspect_ratio() {
        let img = DynamicImage::new_rgb8(2000, 1000);
        let small = generator().render(&img, ThumbnailSize::Small);
        let medium = generator().render(&img, ThumbnailSize::Medium);
        assert_eq!(small.dimensions(), (128, 64));
        assert_eq!(medium.dimensions(), (512, 256));
    }

    #[test]
    fn test_render_portrait() {
        let img = DynamicImage::new_rgb8(300, 900);
        let small = generator().render(&img, ThumbnailSize::Small);
        assert_eq!(small.height(), 128);
        assert!(small.width() <= 43 && small.width() >= 42);
    }

    #[test]
    fn test_render_never_upscales() {
        let img = DynamicImage::new_rgb8(100, 60);
        let small = generator().render(&img, ThumbnailSize::Small);
        let medium = generator().render(&img, ThumbnailSize::Medium);
        assert_eq!(small.dimensions(), (100, 60));
        assert_eq!(medium.dimensions(), (100, 60));
    }

    #[test]
    fn test_generate_bytes_is_jpeg() {
        let img = DynamicImage::new_rgb8(640, 480);
        let bytes = generator()
            .generate_bytes(&img, ThumbnailSize::Small, Path::new("thumb_small.jpg"))
            .unwrap();
        // JPEG SOI marker
        assert_eq!(&bytes[0..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (128, 96));
    }
}
