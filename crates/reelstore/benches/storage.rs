use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use reelstore::{encode_list, parse_list, ListStore};
use tempfile::TempDir;

fn liked_ids(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("clip-{:06}", i)).collect()
}

fn bench_set_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_list");
    group.sample_size(20);
    group.throughput(Throughput::Elements(1));

    for n in [100, 1000] {
        group.bench_function(format!("liked_{}", n), |b| {
            let dir = TempDir::new().unwrap();
            let store = ListStore::open(dir.path()).unwrap();
            let ids = liked_ids(n);

            b.iter(|| {
                store.set_list("liked", black_box(ids.as_slice())).unwrap();
            });
        });
    }
    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_list");
    group.sample_size(50);

    let encoded = encode_list(&liked_ids(1000));
    group.throughput(Throughput::Bytes(encoded.len() as u64));
    group.bench_function("liked_1000", |b| {
        b.iter(|| black_box(parse_list(&encoded).unwrap()));
    });
    group.finish();
}

criterion_group!(benches, bench_set_list, bench_parse);
criterion_main!(benches);
