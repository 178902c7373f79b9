// benches/optimize.rs
//
// Performance benchmarks for the optimization engine.
// Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pyjamaz::{FormatTag, Metric, OptimizationRequest};

// =============================================================================
// FIXTURES
// =============================================================================

/// A deterministic gradient PNG, used as engine input across benchmarks so
/// runs are comparable. Built once per call, not cached, to keep each
/// benchmark iteration's decode cost visible in the `optimize_end_to_end`
/// group while staying out of the codec-only groups below.
fn gradient_png(width: u32, height: u32) -> Vec<u8> {
    use image::{ImageBuffer, Rgb};
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .expect("encode fixture PNG");
    buf
}

fn request(input: Vec<u8>, formats: Vec<FormatTag>, concurrency: u32) -> OptimizationRequest {
    OptimizationRequest {
        input,
        max_bytes: 100_000,
        max_diff: 0.0,
        metric: Metric::None,
        formats,
        concurrency,
        flatten_color: [255, 255, 255],
        cache: None,
    }
}

// =============================================================================
// END-TO-END OPTIMIZE BENCHMARKS
// =============================================================================

/// Benchmark: the whole `optimize()` facade across a realistic image size,
/// one format at a time. Shows the relative cost of each codec's
/// quality-to-size search plus its own decode-back-and-metric pass.
fn bench_optimize_single_format(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimize_single_format");
    let input = gradient_png(640, 480);

    for format in [FormatTag::Jpeg, FormatTag::Png, FormatTag::WebP] {
        group.bench_with_input(BenchmarkId::new("format", format), &format, |b, &format| {
            b.iter(|| {
                let req = request(input.clone(), vec![format], 1);
                black_box(pyjamaz::optimize(&req).expect("optimize failed in bench"))
            });
        });
    }

    group.finish();
}

/// Benchmark: concurrency scaling when all four formats are requested
/// together, mirroring how the CLI's default invocation drives the
/// candidate generator's worker pool.
fn bench_optimize_concurrency_levels(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimize_concurrency_levels");
    let input = gradient_png(640, 480);
    let formats = vec![FormatTag::Jpeg, FormatTag::Png, FormatTag::WebP, FormatTag::Avif];

    for concurrency in [1u32, 2, 4] {
        group.bench_with_input(
            BenchmarkId::new("jobs", concurrency),
            &concurrency,
            |b, &concurrency| {
                b.iter(|| {
                    let req = request(input.clone(), formats.clone(), concurrency);
                    black_box(pyjamaz::optimize(&req).expect("optimize failed in bench"))
                });
            },
        );
    }

    group.finish();
}

// =============================================================================
// SEARCH-ONLY BENCHMARKS
// =============================================================================

/// Benchmark: the bounded binary search in isolation, separate from the
/// decode-back-and-metric cost `optimize()` also pays. Useful for judging
/// whether a codec change shifted the number of iterations needed to
/// converge rather than just total wall time.
fn bench_search_convergence(c: &mut Criterion) {
    let mut group = c.benchmark_group("search_convergence");
    let buffer = {
        let (_, buf) = pyjamaz::decode::decode_and_normalize(&gradient_png(320, 240))
            .expect("decode fixture");
        buf
    };

    for max_bytes in [5_000u32, 20_000, 100_000] {
        group.bench_with_input(
            BenchmarkId::new("max_bytes", max_bytes),
            &max_bytes,
            |b, &max_bytes| {
                b.iter(|| {
                    let codec = pyjamaz::codec::codec_for(FormatTag::Jpeg);
                    black_box(
                        pyjamaz::search::search(codec, &buffer, max_bytes, [255, 255, 255])
                            .expect("search failed in bench"),
                    )
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_optimize_single_format,
    bench_optimize_concurrency_levels,
    bench_search_convergence,
);

criterion_main!(benches);
