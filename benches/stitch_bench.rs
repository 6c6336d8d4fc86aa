use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{Rgba, RgbaImage};
use screenshot_archiver::{
    encode, plan_segments, sanitize_token, stitch, ArchiveBuilder, CaptureResult, OutputFormat,
    PageMetrics, Segment,
};
use std::time::Duration;

fn configure_fast_group(group: &mut criterion::BenchmarkGroup<criterion::measurement::WallTime>) {
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_millis(1000));
    group.sample_size(20);
}

fn segments_for(metrics: &PageMetrics) -> Vec<Segment> {
    plan_segments(metrics.total_height, metrics.viewport_height)
        .into_iter()
        .map(|span| Segment {
            offset: span.offset,
            image: RgbaImage::from_fn(metrics.viewport_width, span.height, |x, y| {
                Rgba([(x % 251) as u8, ((y + span.offset) % 241) as u8, 128, 255])
            }),
        })
        .collect()
}

fn benchmark_plan_segments(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_segments");
    configure_fast_group(&mut group);

    group.bench_function("100k_px_page", |b| {
        b.iter(|| black_box(plan_segments(black_box(100_000), black_box(1080))));
    });

    group.finish();
}

fn benchmark_stitch(c: &mut Criterion) {
    let mut group = c.benchmark_group("stitch");
    configure_fast_group(&mut group);

    for total_height in [4_000u32, 20_000] {
        let metrics = PageMetrics::new(total_height, 1080, 1280);
        let segments = segments_for(&metrics);

        group.bench_with_input(
            BenchmarkId::from_parameter(total_height),
            &segments,
            |b, segments| {
                b.iter(|| black_box(stitch::stitch(segments, &metrics, OutputFormat::Png)));
            },
        );
    }

    group.finish();
}

fn benchmark_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    configure_fast_group(&mut group);

    let image = RgbaImage::from_fn(1280, 2000, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 64, if y % 7 == 0 { 128 } else { 255 }])
    });

    group.bench_function("png", |b| {
        b.iter(|| black_box(encode::encode(&image, OutputFormat::Png, 85)));
    });
    group.bench_function("jpeg", |b| {
        b.iter(|| black_box(encode::encode(&image, OutputFormat::Jpeg, 85)));
    });

    group.finish();
}

fn benchmark_archive(c: &mut Criterion) {
    let mut group = c.benchmark_group("archive");
    configure_fast_group(&mut group);

    let results: Vec<CaptureResult> = (0..20)
        .map(|i| CaptureResult::Captured {
            url: format!("https://example.com/{i}"),
            filename: format!("{:02}-example-com.png", i + 1),
            data: vec![(i % 256) as u8; 64 * 1024],
        })
        .collect();
    let builder = ArchiveBuilder::new("bench", Utc::now());

    group.bench_function("build_20_entries", |b| {
        b.iter(|| black_box(builder.build(&results)));
    });

    group.finish();
}

fn benchmark_sanitize(c: &mut Criterion) {
    let mut group = c.benchmark_group("sanitize_token");
    configure_fast_group(&mut group);

    group.bench_function("title", |b| {
        b.iter(|| {
            black_box(sanitize_token(
                black_box("Quarterly Report: Q1/2024 -- \"Final\" <draft>"),
                60,
            ))
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_plan_segments,
    benchmark_stitch,
    benchmark_encode,
    benchmark_archive,
    benchmark_sanitize
);
criterion_main!(benches);
