//! Buffer lifecycle benchmarks against the software allocator.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use graphic_buffer::testing::SoftwareGralloc;
use graphic_buffer::{GraphicBuffer, PixelFormat, UsageFlags};

fn bench_allocate(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate");
    let entry = SoftwareGralloc::entry_points();

    for (width, height) in [(64, 64), (256, 256), (1280, 720)] {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{height}")),
            &(width, height),
            |b, &(width, height)| {
                b.iter(|| {
                    let buffer = GraphicBuffer::with_entry_points(
                        &entry,
                        width,
                        height,
                        PixelFormat::Rgba8888,
                        UsageFlags::SW_READ_OFTEN | UsageFlags::HW_TEXTURE,
                    )
                    .expect("allocation");
                    std::hint::black_box(buffer.stride());
                });
            },
        );
    }

    group.finish();
}

fn bench_lock_unlock(c: &mut Criterion) {
    let mut group = c.benchmark_group("lock_unlock");
    let entry = SoftwareGralloc::entry_points();
    let mut buffer = GraphicBuffer::with_entry_points(
        &entry,
        256,
        256,
        PixelFormat::Rgba8888,
        UsageFlags::SW_READ_OFTEN | UsageFlags::SW_WRITE_OFTEN,
    )
    .expect("allocation");

    group.throughput(Throughput::Elements(1));
    group.bench_function("raw", |b| {
        b.iter(|| {
            let ptr = buffer.lock(UsageFlags::SW_READ_OFTEN).expect("lock");
            std::hint::black_box(ptr);
            buffer.unlock().expect("unlock");
        });
    });

    group.bench_function("mapped_region", |b| {
        b.iter(|| {
            let region = buffer.map(UsageFlags::SW_READ_OFTEN).expect("map");
            std::hint::black_box(region.as_ptr());
        });
    });

    group.finish();
}

fn bench_native_ref(c: &mut Criterion) {
    let entry = SoftwareGralloc::entry_points();
    let buffer = GraphicBuffer::with_entry_points(
        &entry,
        64,
        64,
        PixelFormat::Rgb565,
        UsageFlags::HW_COMPOSER,
    )
    .expect("allocation");

    c.bench_function("native_buffer_ref", |b| {
        b.iter(|| {
            let native = buffer.native_buffer();
            std::hint::black_box(native.as_ptr());
        });
    });
}

criterion_group!(benches, bench_allocate, bench_lock_unlock, bench_native_ref);
criterion_main!(benches);
