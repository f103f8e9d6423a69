//! Artifact generation: normalize the stored original, write both thumbnails,
//! and collect the metadata the record needs.
//!
//! Everything here is synchronous and CPU-bound; callers on the async runtime
//! should run [`ArtifactGenerator::generate`] on a blocking thread.

use image::DynamicImage;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::PipelineError;
use crate::types::{ExifMap, ThumbnailSize};

use super::decode::{format_to_string, ImageDecoder};
use super::metadata::MetadataExtractor;
use super::thumbnail::{encode_jpeg, ThumbnailGenerator};

/// Format label of every normalized original.
pub const NORMALIZED_FORMAT: &str = "jpg";

/// Derived data for one image, ready to be written to its record.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifacts {
    pub width: u32,
    pub height: u32,
    pub format: String,
    /// Byte size of the re-encoded original
    pub size_bytes: u64,
    pub exif: Option<ExifMap>,
    pub small_path: PathBuf,
    pub medium_path: PathBuf,
}

/// Artifacts plus the normalized JPEG bytes, handed on to the captioner.
#[derive(Debug, Clone)]
pub struct GeneratedArtifacts {
    pub artifacts: Artifacts,
    pub normalized: Vec<u8>,
    /// Format the upload was actually in before normalization
    pub source_format: String,
}

/// Turns a stored upload into its normalized original and thumbnails.
pub struct ArtifactGenerator {
    decoder: ImageDecoder,
    thumbnails: ThumbnailGenerator,
    normalize_quality: u8,
}

impl ArtifactGenerator {
    pub fn new(config: &Config) -> Self {
        Self {
            decoder: ImageDecoder::new(config.limits.clone()),
            thumbnails: ThumbnailGenerator::new(config.thumbnail.clone()),
            normalize_quality: config.thumbnail.normalize_quality,
        }
    }

    /// Run the whole generation for the file at `stored_path`.
    ///
    /// The original is overwritten with its RGB JPEG re-encoding and the
    /// thumbnails land next to it. Any decode, encode or I/O failure aborts the
    /// whole operation; files already written are left on disk but nothing
    /// references them.
    pub fn generate(&self, stored_path: &Path) -> Result<GeneratedArtifacts, PipelineError> {
        let source = std::fs::read(stored_path).map_err(|source| PipelineError::Io {
            path: stored_path.to_path_buf(),
            source,
        })?;

        let decoded = self.decoder.decode_bytes(&source, stored_path)?;
        let source_format = format_to_string(decoded.format);

        // Read EXIF from the upload itself; re-encoding drops it
        let exif = MetadataExtractor::extract_from_bytes(&source);
        drop(source);

        let rgb = DynamicImage::ImageRgb8(decoded.image.into_rgb8());
        let normalized = encode_jpeg(&rgb, self.normalize_quality, stored_path)?;
        write_file(stored_path, &normalized)?;

        let dir = stored_path.parent().unwrap_or_else(|| Path::new("."));
        let small_path = dir.join(ThumbnailSize::Small.file_name());
        let medium_path = dir.join(ThumbnailSize::Medium.file_name());
        for (size, path) in [
            (ThumbnailSize::Small, &small_path),
            (ThumbnailSize::Medium, &medium_path),
        ] {
            let bytes = self.thumbnails.generate_bytes(&rgb, size, path)?;
            write_file(path, &bytes)?;
        }

        let size_bytes = std::fs::metadata(stored_path)
            .map_err(|source| PipelineError::Io {
                path: stored_path.to_path_buf(),
                source,
            })?
            .len();

        tracing::trace!(
            "Generated artifacts for {:?}: {}x{} {} -> {} bytes",
            stored_path,
            decoded.width,
            decoded.height,
            source_format,
            size_bytes
        );

        Ok(GeneratedArtifacts {
            artifacts: Artifacts {
                width: decoded.width,
                height: decoded.height,
                format: NORMALIZED_FORMAT.to_string(),
                size_bytes,
                exif,
                small_path,
                medium_path,
            },
            normalized,
            source_format,
        })
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
    std::fs::write(path, bytes).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, ImageFormat, RgbaImage};
    use std::io::Cursor;

    fn write_image(dir: &Path, image: DynamicImage, format: ImageFormat) -> PathBuf {
        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, format).unwrap();
        let path = dir.join("original.jpg");
        std::fs::write(&path, buf.into_inner()).unwrap();
        path
    }

    #[test]
    fn test_generate_from_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_image(dir.path(), DynamicImage::new_rgb8(2000, 1000), ImageFormat::Jpeg);

        let generated = ArtifactGenerator::new(&Config::default()).generate(&path).unwrap();
        let artifacts = &generated.artifacts;

        assert_eq!((artifacts.width, artifacts.height), (2000, 1000));
        assert_eq!(artifacts.format, "jpg");
        assert_eq!(generated.source_format, "jpeg");
        assert_eq!(artifacts.size_bytes, std::fs::metadata(&path).unwrap().len());
        assert_eq!(artifacts.small_path, dir.path().join("thumb_small.jpg"));
        assert_eq!(artifacts.medium_path, dir.path().join("thumb_medium.jpg"));

        let small = image::open(&artifacts.small_path).unwrap();
        let medium = image::open(&artifacts.medium_path).unwrap();
        assert_eq!(small.dimensions(), (128, 64));
        assert_eq!(medium.dimensions(), (512, 256));
    }

    #[test]
    fn test_png_with_alpha_is_normalized_to_rgb_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let rgba = DynamicImage::ImageRgba8(RgbaImage::new(300, 200));
        let path = write_image(dir.path(), rgba, ImageFormat::Png);

        let generated = ArtifactGenerator::new(&Config::default()).generate(&path).unwrap();
        assert_eq!(generated.source_format, "png");
        assert_eq!(generated.artifacts.format, "jpg");

        let stored = std::fs::read(&path).unwrap();
        assert_eq!(image::guess_format(&stored).unwrap(), ImageFormat::Jpeg);
        assert_eq!(stored, generated.normalized);
        let reopened = image::load_from_memory(&stored).unwrap();
        assert_eq!(reopened.color(), image::ColorType::Rgb8);
    }

    #[test]
    fn test_garbage_fails_without_thumbnails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("original.jpg");
        std::fs::write(&path, b"this is not an image at all").unwrap();

        let result = ArtifactGenerator::new(&Config::default()).generate(&path);
        assert!(result.is_err());
        assert!(!dir.path().join("thumb_small.jpg").exists());
        assert!(!dir.path().join("thumb_medium.jpg").exists());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ArtifactGenerator::new(&Config::default()).generate(&dir.path().join("gone.jpg"));
        assert!(matches!(result, Err(PipelineError::Io { .. })));
    }
}
