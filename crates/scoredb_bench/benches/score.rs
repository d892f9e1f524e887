//! Digest and payload codec benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use scoredb_bench::utils::random_data;
use scoredb_core::codec::encode_block;
use scoredb_core::{PayloadCodec, ScoreKind, ZstdCodec};

/// Benchmark score computation for both digest schemes.
fn bench_compute(c: &mut Criterion) {
    let mut group = c.benchmark_group("score_compute");

    for size in [64, 1024, 64 * 1024].iter() {
        let data = random_data(*size);
        group.throughput(Throughput::Bytes(*size as u64));
        for kind in [ScoreKind::Md5, ScoreKind::Xxh64] {
            group.bench_with_input(BenchmarkId::new(kind.name(), size), &data, |b, data| {
                b.iter(|| black_box(kind.compute(black_box(data))));
            });
        }
    }

    group.finish();
}

/// Benchmark data block encoding.
fn bench_encode_block(c: &mut Criterion) {
    let data = random_data(1024);
    let score = ScoreKind::Md5.compute(&data);

    c.bench_function("encode_block_1k", |b| {
        b.iter(|| black_box(encode_block(&score, black_box(&data)).unwrap()));
    });
}

/// Benchmark zstd compression of repetitive text.
fn bench_zstd(c: &mut Criterion) {
    let codec = ZstdCodec::default();
    let text = "the quick brown fox jumps over the lazy dog ".repeat(256);
    let encoded = codec.encode(text.as_bytes()).unwrap();

    let mut group = c.benchmark_group("zstd");
    group.throughput(Throughput::Bytes(text.len() as u64));
    group.bench_function("encode", |b| b.iter(|| black_box(codec.encode(text.as_bytes()).unwrap())));
    group.bench_function("decode", |b| b.iter(|| black_box(codec.decode(&encoded).unwrap())));
    group.finish();
}

criterion_group!(benches, bench_compute, bench_encode_block, bench_zstd);

criterion_main!(benches);
