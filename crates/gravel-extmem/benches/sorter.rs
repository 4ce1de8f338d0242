use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use gravel_extmem::{ExternalSorter, Lexicographic};

fn bench_sorter(c: &mut Criterion) {
    let mut group = c.benchmark_group("external_sorter");
    for &count in &[10_000u64, 100_000] {
        group.bench_with_input(BenchmarkId::new("push_sort_drain", count), &count, |b, &n| {
            b.iter(|| {
                let mut rng = StdRng::seed_from_u64(42);
                let mut sorter = ExternalSorter::new(Lexicographic, 64 << 10);
                for _ in 0..n {
                    sorter.push(rng.next_u64()).expect("push");
                }
                sorter.sort().expect("sort");
                let mut checksum = 0u64;
                while let Some(v) = sorter.next().expect("stream") {
                    checksum ^= v;
                }
                checksum
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_sorter);
criterion_main!(benches);
