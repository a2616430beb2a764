#![allow(
    clippy::unwrap_used,
    clippy::as_conversions,
    reason = "benchmark"
)]

use {
    criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main},
    sealfile_sdk::{
        NoProgress,
        digest::{ChunkDigest, Md5Algorithm},
        encrypt_file,
        kdf::{SALT_LEN, derive_key},
    },
    std::hint::black_box,
};

fn random_input(size: usize) -> Vec<u8> {
    (0..size).map(|_| rand::random::<u8>()).collect()
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("derive_key", |b| {
        let salt = [7u8; SALT_LEN];
        b.iter(|| derive_key(black_box(b"correct horse battery staple"), &salt));
    });

    let mut group = c.benchmark_group("digest");
    for size in [1024, 1024 * 1024] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || random_input(size),
                |input| {
                    let mut digest =
                        ChunkDigest::<Md5Algorithm, _>::new(input.as_slice(), size as u64, 4096)
                            .unwrap();
                    digest.digest_all().unwrap();
                    digest.finalize()
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();

    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("input");
    let output_path = dir.path().join("output");
    let mut group = c.benchmark_group("encrypt_file");
    group.sample_size(10);
    for size in [1024, 1024 * 1024] {
        fs_err::write(&input_path, random_input(size)).unwrap();
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| encrypt_file(&input_path, &output_path, b"password", &mut NoProgress).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
