use std::sync::Arc;
use std::time::Duration;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use reelcache::{BoundedCache, LikedFlags, ManualClock, Record, TimedCache};

fn record(n: usize) -> Record {
    Record::new(format!("clip-{}", n), format!("https://cdn/{}.mp4", n))
}

fn bench_cached_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("cached_get");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_record_hit", |b| {
        let mut cache = BoundedCache::new(500).unwrap();
        let ids: Vec<String> = (0..100).map(|n| format!("clip-{}", n)).collect();
        for (n, id) in ids.iter().enumerate() {
            cache.put(id.clone(), record(n));
        }

        let mut counter = 0;
        b.iter(|| {
            black_box(cache.get(ids[counter % 100].as_str()));
            counter += 1;
        });
    });

    group.bench_function("get_if_valid_hit", |b| {
        let clock = Arc::new(ManualClock::new());
        let mut cache = TimedCache::new(500, Duration::from_secs(300), clock).unwrap();
        let ids: Vec<String> = (0..100).map(|n| format!("clip-{}", n)).collect();
        for (n, id) in ids.iter().enumerate() {
            cache.put(id.clone(), record(n));
        }

        let mut counter = 0;
        b.iter(|| {
            black_box(cache.get_if_valid(ids[counter % 100].as_str()));
            counter += 1;
        });
    });

    group.finish();
}

fn bench_put_evicting(c: &mut Criterion) {
    let mut group = c.benchmark_group("put");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    group.bench_function("put_full_cache", |b| {
        // Small cache: every put past warmup evicts
        let mut cache = BoundedCache::new(10).unwrap();
        let mut counter = 0usize;
        b.iter(|| {
            black_box(cache.put(counter, record(counter)));
            counter += 1;
        });
    });

    group.finish();
}

fn bench_liked_flags(c: &mut Criterion) {
    let mut group = c.benchmark_group("liked_flags");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_with_trim", |b| {
        let mut flags = LikedFlags::new(1000, 500).unwrap();
        let mut counter = 0usize;
        b.iter(|| {
            black_box(flags.set(format!("clip-{}", counter), true));
            counter += 1;
        });
    });

    group.bench_function("liked_ids_1000", |b| {
        let mut flags = LikedFlags::new(1000, 500).unwrap();
        flags.load((0..1000).map(|n| format!("clip-{}", n)));
        b.iter(|| black_box(flags.liked_ids()));
    });

    group.finish();
}

criterion_group!(benches, bench_cached_get, bench_put_evicting, bench_liked_flags);
criterion_main!(benches);
