use std::hint::black_box;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};

use sliding_limiter::{Limiter, SerializedLimiter};

fn limiter() -> Limiter<u64> {
    Limiter::new(200, Duration::from_secs(60)).unwrap()
}

fn bench_is_limited(c: &mut Criterion) {
    let rl = limiter();
    for _ in 0..5000 {
        rl.is_limited(&1);
    }

    c.bench_function("limiter/is_limited/unknown_key", |b| {
        b.iter(|| black_box(rl.is_limited(black_box(&1))))
    });

    for _ in 0..200 {
        rl.increment(&2);
    }
    c.bench_function("limiter/is_limited/at_limit", |b| {
        b.iter(|| black_box(rl.is_limited(black_box(&2))))
    });
}

fn bench_increment(c: &mut Criterion) {
    let mut group = c.benchmark_group("limiter/increment");

    // Every event stays inside the window, so history is reset at 2 * limit
    // to keep the entry at its steady-state size.
    group.bench_function("hot_key", |b| {
        let rl = limiter();
        let mut n = 0u64;
        b.iter(|| {
            n += 1;
            if n % 400 == 0 {
                rl.remove(&1);
            }
            rl.increment(black_box(&1))
        })
    });

    group.bench_function("distinct_keys", |b| {
        let rl = limiter();
        let mut key = 0u64;
        b.iter(|| {
            key = key.wrapping_add(1);
            rl.increment(black_box(&key))
        })
    });

    group.bench_function("serialized_hot_key", |b| {
        let rl = SerializedLimiter::new(limiter());
        let mut n = 0u64;
        b.iter(|| {
            n += 1;
            if n % 400 == 0 {
                rl.remove(&1);
            }
            rl.increment(black_box(&1))
        })
    });

    group.finish();
}

fn bench_count(c: &mut Criterion) {
    let rl = limiter();
    for _ in 0..300 {
        rl.increment(&1);
    }
    c.bench_function("limiter/count/300_events", |b| {
        b.iter(|| black_box(rl.count(black_box(&1))))
    });
}

criterion_group!(benches, bench_is_limited, bench_increment, bench_count);
criterion_main!(benches);
