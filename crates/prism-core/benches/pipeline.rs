//! Benchmarks for the Prism processing pipeline.
//!
//! Run with: cargo bench -p prism-core

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{DynamicImage, ImageFormat};
use prism_core::config::{Config, LimitsConfig, ThumbnailConfig};
use prism_core::pipeline::{ArtifactGenerator, ImageDecoder, MetadataExtractor, ThumbnailGenerator};
use prism_core::ThumbnailSize;
use std::io::Cursor;
use std::path::Path;

fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::new_rgb8(width, height)
        .write_to(&mut buf, ImageFormat::Jpeg)
        .unwrap();
    buf.into_inner()
}

fn benchmark_decode(c: &mut Criterion) {
    let bytes = jpeg_bytes(1920, 1080);
    let decoder = ImageDecoder::new(LimitsConfig::default());

    c.bench_function("decode_1080p_jpeg", |b| {
        b.iter(|| {
            let _ = decoder.decode_bytes(black_box(&bytes), Path::new("bench.jpg"));
        })
    });
}

fn benchmark_thumbnail(c: &mut Criterion) {
    let img = DynamicImage::new_rgb8(1920, 1080);
    let generator = ThumbnailGenerator::new(ThumbnailConfig::default());

    c.bench_function("thumbnail_small", |b| {
        b.iter(|| {
            let _ = generator.generate_bytes(
                black_box(&img),
                ThumbnailSize::Small,
                Path::new("thumb_small.jpg"),
            );
        })
    });

    c.bench_function("thumbnail_medium", |b| {
        b.iter(|| {
            let _ = generator.generate_bytes(
                black_box(&img),
                ThumbnailSize::Medium,
                Path::new("thumb_medium.jpg"),
            );
        })
    });
}

fn benchmark_metadata(c: &mut Criterion) {
    let bytes = jpeg_bytes(640, 480);

    c.bench_function("metadata_extract", |b| {
        b.iter(|| {
            let _ = MetadataExtractor::extract_from_bytes(black_box(&bytes));
        })
    });
}

fn benchmark_generate(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("original.jpg");
    let source = jpeg_bytes(1920, 1080);
    let generator = ArtifactGenerator::new(&Config::default());

    c.bench_function("generate_artifacts_1080p", |b| {
        b.iter(|| {
            // generate() overwrites the original, so restore it every round
            std::fs::write(&path, &source).unwrap();
            let _ = generator.generate(black_box(&path));
        })
    });
}

criterion_group!(
    benches,
    benchmark_decode,
    benchmark_thumbnail,
    benchmark_metadata,
    benchmark_generate,
);
criterion_main!(benches);
