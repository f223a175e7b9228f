use bgremove_pro::{
    error::Result,
    matting, BackgroundRemover, CacheKey, CachedRemover, MattingParams, NoticeBoard,
    SegmentationCapability, Segmenter,
};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage, RgbaImage};
use std::sync::Arc;

/// Predicts a centred disc and runs the real cutout path
struct DiscSegmenter;

impl Segmenter for DiscSegmenter {
    fn name(&self) -> &str {
        "bench-disc"
    }

    fn segment(&self, image: &DynamicImage, params: MattingParams) -> Result<RgbaImage> {
        let (width, height) = (image.width(), image.height());
        let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
        let radius = width.min(height) as f32 / 3.0;
        let mask = GrayImage::from_fn(width, height, |x, y| {
            let d = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt();
            Luma([if d < radius { 255 } else { 0 }])
        });
        matting::cutout(image, &mask, &params)
    }
}

fn bench_image(width: u32, height: u32) -> Arc<DynamicImage> {
    Arc::new(DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x ^ y) % 256) as u8])
    })))
}

fn cached_remover() -> CachedRemover {
    let capability = SegmentationCapability::available(Arc::new(DiscSegmenter));
    CachedRemover::new(BackgroundRemover::new(capability, NoticeBoard::new()), 16)
}

fn benchmark_cache_key(c: &mut Criterion) {
    let image = bench_image(1000, 500);
    let params = MattingParams::disabled();

    c.bench_function("cache_key_1000x500", |b| {
        b.iter(|| CacheKey::new(black_box(&image), black_box(&params)));
    });
}

fn benchmark_cache_comparison(c: &mut Criterion) {
    let image = bench_image(400, 300);
    let mut group = c.benchmark_group("removal_400x300");

    for (label, params) in [
        ("naive", MattingParams::disabled()),
        ("alpha_matting", MattingParams::enabled(240, 10, 10).unwrap()),
    ] {
        group.bench_function(format!("{label}_miss"), |b| {
            b.iter_batched(
                cached_remover,
                |remover| remover.remove(black_box(&image), params),
                BatchSize::SmallInput,
            );
        });

        let warm = cached_remover();
        warm.remove(&image, params);
        group.bench_function(format!("{label}_hit"), |b| {
            b.iter(|| warm.remove(black_box(&image), params));
        });
    }

    group.finish();
}

criterion_group!(cache_benches, benchmark_cache_key, benchmark_cache_comparison);
criterion_main!(cache_benches);
