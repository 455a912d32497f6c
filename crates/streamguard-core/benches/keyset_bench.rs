use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use once_cell::sync::Lazy;
use std::hint::black_box;
use streamguard_core::keyset::{KeySetConfigBuilder, MemoryBoundedKeySet};

/// Zero-padded keys where every value appears `1 / unique_pct` times.
fn create_keys_with_uniqueness(size: usize, unique_pct: f64, str_len: usize) -> Vec<String> {
    let num_unique = ((size as f64) * unique_pct).max(1.0) as usize;
    (0..size)
        .map(|i| format!("{:0width$}", i % num_unique, width = str_len))
        .collect()
}

static KEYS_50PCT_UNIQUE: Lazy<Vec<(usize, Vec<String>)>> = Lazy::new(|| {
    [10_000usize, 100_000]
        .iter()
        .map(|&size| (size, create_keys_with_uniqueness(size, 0.5, 32)))
        .collect()
});

/// All keys fit in memory.
fn bench_keyset_in_memory(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyset_in_memory");

    for (size, keys) in KEYS_50PCT_UNIQUE.iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), keys, |b, keys| {
            b.iter(|| {
                let mut set = MemoryBoundedKeySet::with_memory_limit(usize::MAX).unwrap();
                for key in keys {
                    black_box(set.add(key.as_str()).unwrap());
                }
                set.close().unwrap();
            });
        });
    }

    group.finish();
}

/// A tenth of the unique keys fit in memory, the rest go to disk.
fn bench_keyset_spilled(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyset_spilled");
    group.sample_size(10);

    for (size, keys) in KEYS_50PCT_UNIQUE.iter() {
        let memory_limit = size / 20;
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("no_prefilter", size), keys, |b, keys| {
            b.iter(|| {
                let mut set = MemoryBoundedKeySet::with_memory_limit(memory_limit).unwrap();
                for key in keys {
                    black_box(set.add(key.as_str()).unwrap());
                }
                set.close().unwrap();
            });
        });
        group.bench_with_input(BenchmarkId::new("prefilter", size), keys, |b, keys| {
            b.iter(|| {
                let config = KeySetConfigBuilder::new()
                    .with_memory_limit(memory_limit)
                    .with_prefilter(*size, 0.01)
                    .build();
                let mut set = MemoryBoundedKeySet::new(config).unwrap();
                for key in keys {
                    black_box(set.add(key.as_str()).unwrap());
                }
                set.close().unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_keyset_in_memory, bench_keyset_spilled);
criterion_main!(benches);
