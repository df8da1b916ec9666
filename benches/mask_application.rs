use bgremove_lambda::segmenter::{apply_mask, tensor_to_mask};
use bgremove_lambda::utils::ImagePreprocessor;
use bgremove_lambda::PreprocessingConfig;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{Rgba, RgbaImage};
use ndarray::Array4;

const CANVAS: usize = 1024;

fn source_image(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    })
}

fn disc_output() -> Array4<f32> {
    let radius = CANVAS as f32 / 4.0;
    let center = CANVAS as f32 / 2.0;
    Array4::from_shape_fn((1, 1, CANVAS, CANVAS), |(_, _, y, x)| {
        let dx = x as f32 + 0.5 - center;
        let dy = y as f32 + 0.5 - center;
        if (dx * dx + dy * dy).sqrt() <= radius {
            1.0
        } else {
            0.0
        }
    })
}

fn bench_postprocessing(c: &mut Criterion) {
    let mut group = c.benchmark_group("postprocessing");
    group.sample_size(20);
    let output = disc_output();

    for (width, height) in [(640, 480), (1920, 1080), (3024, 4032)] {
        let label = format!("{width}x{height}");
        let image = source_image(width, height);

        group.bench_with_input(
            BenchmarkId::new("tensor_to_mask", &label),
            &(width, height),
            |b, &dims| {
                b.iter(|| tensor_to_mask(black_box(&output), dims).unwrap());
            },
        );

        let mask = tensor_to_mask(&output, (width, height)).unwrap();
        group.bench_with_input(BenchmarkId::new("apply_mask", &label), &image, |b, image| {
            b.iter(|| apply_mask(black_box(image.clone()), &mask).unwrap());
        });
    }

    group.finish();
}

fn bench_preprocessing(c: &mut Criterion) {
    let mut group = c.benchmark_group("preprocessing");
    group.sample_size(20);
    let config = PreprocessingConfig::default();

    for (width, height) in [(640, 480), (1920, 1080)] {
        let image = source_image(width, height);
        group.bench_with_input(
            BenchmarkId::new("letterbox", format!("{width}x{height}")),
            &image,
            |b, image| {
                b.iter(|| ImagePreprocessor::preprocess(black_box(image), &config).unwrap());
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_postprocessing, bench_preprocessing);
criterion_main!(benches);
