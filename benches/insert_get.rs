use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hamt_map::Map;

fn insert_dense(c: &mut Criterion) {
    c.bench_function("insert 10k dense i64 keys", |b| {
        b.iter(|| {
            let mut map: Map<i64, i64> = Map::new();
            for i in 0..10_000i64 {
                map.insert(black_box(i), black_box(i));
            }
            map
        });
    });
}

fn get_hit(c: &mut Criterion) {
    let mut map: Map<i64, i64> = Map::new();
    for i in 0..10_000i64 {
        map.insert(i, i);
    }

    c.bench_function("get 10k dense i64 keys", |b| {
        b.iter(|| {
            for i in 0..10_000i64 {
                black_box(map.get(&black_box(i)));
            }
        });
    });
}

criterion_group!(benches, insert_dense, get_hit);
criterion_main!(benches);
