use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use xbase_core::shp::{RTree, Rect};

fn build_tree(n: usize) -> RTree<usize> {
    let mut tree = RTree::new(16, 4);
    for i in 0..n {
        let x = (i % 1000) as f64;
        let y = (i / 1000) as f64;
        tree.insert(Rect::point(x, y), i);
    }
    tree
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("rtree_insert");
    for n in [100, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| build_tree(n));
        });
    }
    group.finish();
}

fn bench_search_point(c: &mut Criterion) {
    let tree = build_tree(10_000);
    c.bench_function("rtree_search_point_10000", |b| {
        b.iter(|| tree.search_point(500.0, 5.0));
    });
}

fn bench_nearest(c: &mut Criterion) {
    let tree = build_tree(10_000);
    c.bench_function("rtree_nearest_10000", |b| {
        b.iter(|| tree.nearest(500.0, 5.0, 10));
    });
}

criterion_group!(benches, bench_insert, bench_search_point, bench_nearest);
criterion_main!(benches);
