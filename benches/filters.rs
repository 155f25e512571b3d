//! Benchmarks for CPU filter passes.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use prisma::prelude::*;

fn test_image(size: u32) -> PixelBuffer {
    PixelBuffer::from_fn(size, size, |x, y| {
        [(x * 7) as u8, (y * 13) as u8, ((x ^ y) * 3) as u8, 255]
    })
    .expect("non-empty image")
}

/// Benchmark Gaussian kernel construction.
fn bench_kernel(c: &mut Criterion) {
    let mut group = c.benchmark_group("kernel");
    for size in [3u32, 7, 15] {
        group.bench_with_input(BenchmarkId::new("gaussian", size), &size, |b, &size| {
            b.iter(|| gaussian_kernel(black_box(2.0), size))
        });
    }
    group.finish();
}

/// Benchmark convolution-style filters across kernel sizes.
fn bench_convolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("convolution");
    let image = test_image(128);
    group.throughput(Throughput::Elements(128 * 128));

    for size in [3u32, 7, 15] {
        let blur = GaussianBlur::new(2.0, size).expect("valid blur");
        group.bench_with_input(BenchmarkId::new("gaussian_blur", size), &image, |b, img| {
            b.iter(|| {
                let mut buffer = img.clone();
                blur.apply_cpu(black_box(&mut buffer));
                buffer
            })
        });
    }

    for size in [3u32, 5, 7] {
        let median = MedianFilter::new(size).expect("valid median");
        group.bench_with_input(BenchmarkId::new("median", size), &image, |b, img| {
            b.iter(|| {
                let mut buffer = img.clone();
                median.apply_cpu(black_box(&mut buffer));
                buffer
            })
        });
    }

    let bilateral = BilateralFilter::new(2.0, 0.2, 7).expect("valid bilateral");
    group.bench_with_input(BenchmarkId::new("bilateral", 7), &image, |b, img| {
        b.iter(|| {
            let mut buffer = img.clone();
            bilateral.apply_cpu(black_box(&mut buffer));
            buffer
        })
    });

    group.finish();
}

/// Benchmark the full Canny cascade.
fn bench_edges(c: &mut Criterion) {
    let mut group = c.benchmark_group("edges");
    for size in [64u32, 256] {
        let image = test_image(size);
        let canny = CannyEdge::new(1.0, 5, 10.0, 20.0).expect("valid canny");
        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_with_input(BenchmarkId::new("canny", size), &image, |b, img| {
            b.iter(|| canny.detect(black_box(img)))
        });
    }
    group.finish();
}

/// Benchmark a typical multi-filter chain on the CPU backend.
fn bench_chain(c: &mut Criterion) {
    let chain = FilterChain::new()
        .with("exposure", Exposure::new(0.5).expect("valid exposure"))
        .with("blur", GaussianBlur::new(1.5, 5).expect("valid blur"))
        .with("sharpen", Sharpen::new(0.8).expect("valid sharpen"))
        .with("tone", ColorTone::new(Tone::Warm, true))
        .with("vignette", Vignette::new(0.6, 0.3, true).expect("valid vignette"));
    let image = test_image(256);
    let mut engine = RenderEngine::cpu();

    c.bench_function("chain/cpu_256", |b| {
        b.iter(|| engine.render(black_box(&chain), black_box(&image)).expect("cpu render"))
    });
}

criterion_group!(benches, bench_kernel, bench_convolution, bench_edges, bench_chain);
criterion_main!(benches);
